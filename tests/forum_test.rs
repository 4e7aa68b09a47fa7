mod common;

use agora::db::models::{CategoryId, PostId};
use agora::forum::{ForumError, ForumStore};
use agora::reactions::{ReactionEngine, ReactionTarget, Stance};
use common::{create_user, deadline, test_db};

#[test]
fn categories_are_seeded() {
    let db = test_db();
    let forum = ForumStore::new(db.pool.clone());
    let names: Vec<String> = forum
        .list_categories(deadline())
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["General", "Rust", "Web", "Off-topic"]);
}

#[test]
fn create_post_links_categories() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let forum = ForumStore::new(db.pool.clone());

    let id = forum
        .create_post(
            alice,
            "Borrow checker",
            "Why does it hate me?",
            &[CategoryId(2), CategoryId(1)],
            deadline(),
        )
        .unwrap();

    let post = forum.get_post(id, None, deadline()).unwrap();
    assert_eq!(post.title, "Borrow checker");
    assert_eq!(post.author, "alice");
    let ids: Vec<CategoryId> = post.categories.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![CategoryId(1), CategoryId(2)]);
    assert_eq!(post.comment_count, 0);
    assert_eq!(post.viewer_stance, None);
}

#[test]
fn unknown_category_rejects_whole_post() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let forum = ForumStore::new(db.pool.clone());

    let err = forum
        .create_post(alice, "t", "b", &[CategoryId(1), CategoryId(99)], deadline())
        .unwrap_err();
    assert!(matches!(err, ForumError::UnknownCategory(CategoryId(99))));
    assert!(forum.list_posts(None, None, deadline()).unwrap().is_empty());
}

#[test]
fn list_posts_is_newest_first_and_filters() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let forum = ForumStore::new(db.pool.clone());

    let first = forum
        .create_post(alice, "first", "b", &[CategoryId(2)], deadline())
        .unwrap();
    let second = forum
        .create_post(alice, "second", "b", &[CategoryId(3)], deadline())
        .unwrap();
    let third = forum
        .create_post(alice, "third", "b", &[CategoryId(2), CategoryId(3)], deadline())
        .unwrap();

    let all: Vec<PostId> = forum
        .list_posts(None, None, deadline())
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(all, vec![third, second, first]);

    let rust: Vec<PostId> = forum
        .list_posts(Some(CategoryId(2)), None, deadline())
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(rust, vec![third, first]);

    assert!(forum
        .list_posts(Some(CategoryId(4)), None, deadline())
        .unwrap()
        .is_empty());
}

#[test]
fn get_missing_post_is_not_found() {
    let db = test_db();
    let forum = ForumStore::new(db.pool.clone());
    assert!(matches!(
        forum.get_post(PostId(7), None, deadline()),
        Err(ForumError::NotFound)
    ));
}

#[test]
fn comments_require_existing_post() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let forum = ForumStore::new(db.pool.clone());
    assert!(matches!(
        forum.create_comment(PostId(7), alice, "hi", deadline()),
        Err(ForumError::NotFound)
    ));
}

#[test]
fn comments_are_oldest_first_and_counted() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let bob = create_user(&db.pool, "bob", "password2");
    let forum = ForumStore::new(db.pool.clone());

    let post = forum.create_post(alice, "t", "b", &[], deadline()).unwrap();
    let c1 = forum.create_comment(post, bob, "one", deadline()).unwrap();
    let c2 = forum.create_comment(post, alice, "two", deadline()).unwrap();

    let comments = forum.list_comments(post, None, deadline()).unwrap();
    let ids: Vec<_> = comments.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c1, c2]);
    assert_eq!(comments[0].author, "bob");
    assert_eq!(forum.comment_post(c2, deadline()).unwrap(), post);

    let summary = forum.get_post(post, None, deadline()).unwrap();
    assert_eq!(summary.comment_count, 2);
}

#[test]
fn listings_carry_reaction_counts_and_viewer_stance() {
    let db = test_db();
    let alice = create_user(&db.pool, "alice", "password1");
    let bob = create_user(&db.pool, "bob", "password2");
    let forum = ForumStore::new(db.pool.clone());
    let engine = ReactionEngine::new(db.pool.clone(), forum.clone());

    let post = forum.create_post(alice, "t", "b", &[], deadline()).unwrap();
    let comment = forum.create_comment(post, bob, "c", deadline()).unwrap();

    engine
        .set_reaction(alice, ReactionTarget::Post(post), Stance::Like, deadline())
        .unwrap();
    engine
        .set_reaction(bob, ReactionTarget::Post(post), Stance::Dislike, deadline())
        .unwrap();
    engine
        .set_reaction(alice, ReactionTarget::Comment(comment), Stance::Dislike, deadline())
        .unwrap();

    let as_alice = forum.get_post(post, Some(alice), deadline()).unwrap();
    assert_eq!((as_alice.counts.likes, as_alice.counts.dislikes), (1, 1));
    assert_eq!(as_alice.viewer_stance, Some(Stance::Like));

    let as_bob = &forum.list_posts(None, Some(bob), deadline()).unwrap()[0];
    assert_eq!(as_bob.viewer_stance, Some(Stance::Dislike));

    let comments = forum.list_comments(post, Some(alice), deadline()).unwrap();
    assert_eq!(comments[0].counts.dislikes, 1);
    assert_eq!(comments[0].viewer_stance, Some(Stance::Dislike));

    let anonymous = forum.list_comments(post, None, deadline()).unwrap();
    assert_eq!(anonymous[0].viewer_stance, None);
}
