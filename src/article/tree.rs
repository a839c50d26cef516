//! Builds the nested reply tree out of the flat rows storage returns.

use super::ArticleRow;
use serde::Serialize;
use std::collections::HashMap;

/// How deep a reply chain may nest below the root. The storage fetch caps
/// its recursion at the same depth; the builder enforces it independently
/// so a bad row cannot blow the stack.
pub const REPLY_DEPTH_LIMIT: usize = 10;

/// One article with its replies nested beneath it.
#[derive(Clone, Debug, Serialize)]
pub struct ArticleNode {
    #[serde(flatten)]
    pub article: ArticleRow,
    pub replies: Vec<ArticleNode>,
}

/// Assembles the reply tree for `root` from a flat row list.
///
/// Rows keep their input order among siblings. A row for the root itself
/// is skipped, so the storage fetch may include it. Rows that never chain
/// up to the root are dropped, as is anything nested past the depth limit.
pub fn build(root: ArticleRow, rows: Vec<ArticleRow>) -> ArticleNode {
    let root_id = root.id;

    // Group rows under their parent, keeping input order within each group.
    let mut children_of: HashMap<i32, Vec<ArticleRow>> = HashMap::new();
    for row in rows {
        if row.id == root_id {
            continue;
        }
        children_of.entry(row.reply_to).or_default().push(row);
    }

    // Walk down from the root, taking each parent's rows exactly once.
    // Taking via remove() also breaks reply cycles in malformed data.
    let mut taken: Vec<(i32, Vec<ArticleRow>)> = Vec::new();
    let mut frontier: Vec<(i32, usize)> = vec![(root_id, 0)];

    while let Some((parent_id, depth)) = frontier.pop() {
        if depth == REPLY_DEPTH_LIMIT {
            continue;
        }

        if let Some(rows) = children_of.remove(&parent_id) {
            for row in rows.iter() {
                frontier.push((row.id, depth + 1));
            }
            taken.push((parent_id, rows));
        }
    }

    // Attach deepest groups first so every parent finds its finished
    // children waiting in the map.
    let mut built: HashMap<i32, Vec<ArticleNode>> = HashMap::new();
    for (parent_id, rows) in taken.into_iter().rev() {
        let nodes = rows
            .into_iter()
            .map(|row| ArticleNode {
                replies: built.remove(&row.id).unwrap_or_default(),
                article: row,
            })
            .collect();
        built.insert(parent_id, nodes);
    }

    ArticleNode {
        replies: built.remove(&root_id).unwrap_or_default(),
        article: root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: i32, reply_to: i32) -> ArticleRow {
        let now = Utc::now().naive_utc();
        ArticleRow {
            id,
            title: String::new(),
            author_id: 1,
            author_name: "ada".to_owned(),
            content: format!("article {}", id),
            link: None,
            category: None,
            reply_to,
            reply_depth: 0,
            created_at: now,
            updated_at: now,
            vote_up_count: 0,
            vote_down_count: 0,
            participate_count: 1,
            children_count: 0,
            viewer_vote: None,
            viewer_react: None,
            viewer_saved: false,
            viewer_subscribed: false,
            locked: false,
        }
    }

    fn ids(nodes: &[ArticleNode]) -> Vec<i32> {
        nodes.iter().map(|n| n.article.id).collect()
    }

    #[test]
    fn nests_replies_under_their_parents() {
        let tree = build(
            row(1, 0),
            vec![row(2, 1), row(3, 1), row(4, 2), row(5, 2), row(6, 4)],
        );

        assert_eq!(tree.article.id, 1);
        assert_eq!(ids(&tree.replies), vec![2, 3]);
        assert_eq!(ids(&tree.replies[0].replies), vec![4, 5]);
        assert_eq!(ids(&tree.replies[0].replies[0].replies), vec![6]);
        assert!(tree.replies[0].replies[1].replies.is_empty());
        assert!(tree.replies[1].replies.is_empty());
    }

    #[test]
    fn siblings_keep_input_order() {
        let tree = build(row(1, 0), vec![row(3, 1), row(2, 1), row(5, 1), row(4, 1)]);
        assert_eq!(ids(&tree.replies), vec![3, 2, 5, 4]);
    }

    #[test]
    fn skips_a_row_for_the_root_itself() {
        let tree = build(row(1, 0), vec![row(1, 0), row(2, 1)]);
        assert_eq!(ids(&tree.replies), vec![2]);
    }

    #[test]
    fn drops_rows_that_never_reach_the_root() {
        // 2 does not descend from root 1, so 3, 4 and 5 are stranded too.
        let tree = build(
            row(1, 0),
            vec![row(3, 2), row(2, 0), row(5, 4), row(4, 2)],
        );

        assert_eq!(tree.article.id, 1);
        assert!(tree.replies.is_empty());
    }

    #[test]
    fn mixed_orphans_do_not_disturb_attached_rows() {
        let tree = build(row(1, 0), vec![row(2, 1), row(9, 8), row(3, 2)]);

        assert_eq!(ids(&tree.replies), vec![2]);
        assert_eq!(ids(&tree.replies[0].replies), vec![3]);
    }

    #[test]
    fn stops_at_the_depth_limit() {
        // Chain 2 -> 3 -> ... -> 13, one reply per level.
        let rows: Vec<ArticleRow> = (2..=13).map(|id| row(id, id - 1)).collect();
        let tree = build(row(1, 0), rows);

        let mut node = &tree;
        for expected in 2..=11 {
            assert_eq!(ids(&node.replies), vec![expected]);
            node = &node.replies[0];
        }
        // Depth 11 and beyond fell off.
        assert!(node.replies.is_empty());
    }

    #[test]
    fn reply_cycles_terminate() {
        // 4 and 5 point at each other and never reach the root.
        let tree = build(row(1, 0), vec![row(2, 1), row(4, 5), row(5, 4)]);
        assert_eq!(ids(&tree.replies), vec![2]);
    }

    #[test]
    fn children_count_passes_through_untouched() {
        let mut reply = row(2, 1);
        reply.children_count = 7;

        let tree = build(row(1, 0), vec![reply]);
        assert_eq!(tree.replies[0].article.children_count, 7);
    }
}
