use std::collections::HashMap;

use uuid::Uuid;

use crate::models::ForumComment;

/// A top-level comment and its replies, both in fetch order.
#[derive(Debug, Clone)]
pub struct CommentThread {
    pub parent: ForumComment,
    pub replies: Vec<ForumComment>,
}

/// Build the two-level display tree from a post's flat comment list.
///
/// Parents keep their input order (the fetch is chronological ascending)
/// and each reply list is likewise chronological. A reply whose parent is
/// not in the input is dropped. Every comment appears at most once.
pub fn thread_comments(comments: Vec<ForumComment>) -> Vec<CommentThread> {
    let mut parents = Vec::new();
    let mut replies_by_parent: HashMap<Uuid, Vec<ForumComment>> = HashMap::new();

    for comment in comments {
        match comment.parent_comment_id {
            None => parents.push(comment),
            Some(parent_id) => replies_by_parent
                .entry(parent_id)
                .or_default()
                .push(comment),
        }
    }

    parents
        .into_iter()
        .map(|parent| {
            let replies = replies_by_parent.remove(&parent.id).unwrap_or_default();
            CommentThread { parent, replies }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::reactions::ReactionSet;

    fn comment(id: u128, parent: Option<u128>, minute: u32) -> ForumComment {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap();
        ForumComment {
            id: Uuid::from_u128(id),
            post_id: Uuid::from_u128(99),
            parent_comment_id: parent.map(Uuid::from_u128),
            content: format!("comment {id}"),
            author_id: Uuid::from_u128(1),
            likes: ReactionSet::new(),
            created_at: at,
            updated_at: at,
            is_edited: false,
        }
    }

    #[test]
    fn partitions_parents_and_replies() {
        let input = vec![
            comment(1, None, 0),
            comment(2, Some(1), 1),
            comment(3, None, 2),
            comment(4, Some(1), 3),
            comment(5, Some(3), 4),
        ];
        let threads = thread_comments(input);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].parent.id, Uuid::from_u128(1));
        assert_eq!(
            threads[0].replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![Uuid::from_u128(2), Uuid::from_u128(4)]
        );
        assert_eq!(threads[1].parent.id, Uuid::from_u128(3));
        assert_eq!(threads[1].replies.len(), 1);
    }

    #[test]
    fn is_a_partition_with_no_duplicates() {
        let input = vec![
            comment(1, None, 0),
            comment(2, Some(1), 1),
            comment(3, None, 2),
            comment(4, Some(3), 3),
        ];
        let total = input.len();
        let threads = thread_comments(input);

        let mut seen = std::collections::HashSet::new();
        for thread in &threads {
            assert!(seen.insert(thread.parent.id));
            for reply in &thread.replies {
                assert!(seen.insert(reply.id));
            }
        }
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn orphaned_replies_are_dropped() {
        let input = vec![comment(1, None, 0), comment(2, Some(42), 1)];
        let threads = thread_comments(input);

        assert_eq!(threads.len(), 1);
        assert!(threads[0].replies.is_empty());
    }

    #[test]
    fn empty_input_yields_no_threads() {
        assert!(thread_comments(Vec::new()).is_empty());
    }
}
