use crate::api::{Comment, CommentId};

/// A comment along with all its replies, in path order
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Thread {
    pub comment: Comment,
    pub replies: Vec<Thread>,
}

impl Thread {
    fn leaf(comment: Comment) -> Thread {
        Thread {
            comment,
            replies: Vec::new(),
        }
    }

    /// Rebuild the reply trees from a list of comments of one scope
    ///
    /// Comments whose parent is not in the list (eg. because it is on another
    /// page) are shown as top-level threads.
    pub fn build(comments: impl IntoIterator<Item = Comment>) -> Vec<Thread> {
        let mut comments = comments.into_iter().collect::<Vec<_>>();
        comments.sort_unstable_by(|a, b| a.path().cmp(b.path()));

        let mut roots = Vec::new();
        // currently open branch, from the top-level thread down; orphans are
        // flagged so that they go back to the top level once closed
        let mut branch: Vec<(Thread, bool)> = Vec::new();
        for c in comments {
            while branch
                .last()
                .map_or(false, |(top, _)| !top.comment.path().is_ancestor_of(c.path()))
            {
                close_one(&mut branch, &mut roots);
            }
            let attaches = match branch.last() {
                None => c.is_root(),
                Some((top, _)) => c.path().parent().as_ref() == Some(top.comment.path()),
            };
            if !attaches {
                tracing::warn!(
                    id = ?c.id(),
                    path = %c.path(),
                    "parent of comment is missing, showing it as a top-level thread"
                );
            }
            branch.push((Thread::leaf(c), !attaches));
        }
        while !branch.is_empty() {
            close_one(&mut branch, &mut roots);
        }
        roots.sort_unstable_by(|a, b| a.comment.path().cmp(b.comment.path()));
        roots
    }

    pub fn find_in<'a>(threads: &'a mut [Thread], id: &CommentId) -> Option<&'a mut Thread> {
        for t in threads.iter_mut() {
            if t.comment.id() == *id {
                return Some(t);
            }
            if let Some(res) = Thread::find_in(&mut t.replies, id) {
                return Some(res);
            }
        }
        None
    }

    /// Number of comments in this thread, including tombstones
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(|r| r.size()).sum::<usize>()
    }

    /// Depth-first walk over the thread, yielding each comment with its depth
    /// relative to this thread
    pub fn walk(&self) -> Vec<(usize, &Comment)> {
        let mut res = Vec::with_capacity(self.size());
        self.walk_into(0, &mut res);
        res
    }

    fn walk_into<'a>(&'a self, depth: usize, res: &mut Vec<(usize, &'a Comment)>) {
        res.push((depth, &self.comment));
        for r in &self.replies {
            r.walk_into(depth + 1, res);
        }
    }
}

fn close_one(branch: &mut Vec<(Thread, bool)>, roots: &mut Vec<Thread>) {
    if let Some((done, orphan)) = branch.pop() {
        match (orphan, branch.last_mut()) {
            (false, Some((parent, _))) => parent.replies.push(done),
            _ => roots.push(done),
        }
    }
}
