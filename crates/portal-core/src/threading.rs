//! Thread addressing and reply-tree assembly.

use std::collections::HashMap;

use uuid::Uuid;

use portal_types::models::{Message, ThreadNode};

use crate::PortalError;

/// A message as submitted, before thread metadata is settled.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub body: String,
    pub subject: Option<String>,
    pub parent_message_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
}

/// Fields of a message ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMessage {
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub parent_message_id: Option<Uuid>,
}

impl PlannedMessage {
    pub fn is_reply(&self) -> bool {
        self.parent_message_id.is_some()
    }
}

/// Settles thread id, subject, subject student and recipient for a new message.
///
/// Roots always open a fresh thread. Replies take thread id, subject student
/// and subject from `parent` whatever the draft says, and are addressed to the
/// other party of `parent`.
pub fn plan_message(draft: MessageDraft, parent: Option<&Message>) -> Result<PlannedMessage, PortalError> {
    if draft.body.trim().is_empty() {
        return Err(PortalError::validation("message body is empty"));
    }

    match (draft.parent_message_id, parent) {
        (Some(parent_id), Some(parent)) if parent.id == parent_id => {
            let recipient_id = reply_recipient(parent, draft.sender_id)
                .ok_or_else(|| PortalError::validation("parent message has no one to reply to"))?;
            Ok(PlannedMessage {
                thread_id: parent.thread_id,
                sender_id: draft.sender_id,
                recipient_id: Some(recipient_id),
                student_id: parent.student_id,
                subject: parent.subject.clone(),
                body: draft.body,
                parent_message_id: Some(parent.id),
            })
        }
        (Some(_), _) => Err(PortalError::NotFound("parent message")),
        (None, _) => {
            if draft.recipient_id.is_none() && draft.student_id.is_none() {
                return Err(PortalError::validation("message needs a recipient or a student"));
            }
            let subject = draft
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            Ok(PlannedMessage {
                thread_id: Uuid::new_v4(),
                sender_id: draft.sender_id,
                recipient_id: draft.recipient_id,
                student_id: draft.student_id,
                subject,
                body: draft.body,
                parent_message_id: None,
            })
        }
    }
}

/// The other party of `message` from the point of view of `replier`.
///
/// The original sender replies to the recipient (or to the subject student
/// when the message had no explicit recipient); anyone else replies to the
/// sender.
pub fn reply_recipient(message: &Message, replier: Uuid) -> Option<Uuid> {
    if replier == message.sender_id {
        message.recipient_id.or(message.student_id)
    } else {
        Some(message.sender_id)
    }
}

/// True when `user_id` is the addressee of `message` for read-state purposes.
/// A message without a recipient is addressed to its subject student.
pub fn is_addressed_to(message: &Message, user_id: Uuid) -> bool {
    match message.recipient_id {
        Some(recipient) => recipient == user_id,
        None => message.student_id == Some(user_id) && message.sender_id != user_id,
    }
}

/// Whether `user_id` takes part in the conversation `message` belongs to.
pub fn is_participant(message: &Message, user_id: Uuid) -> bool {
    message.sender_id == user_id
        || message.recipient_id == Some(user_id)
        || message.student_id == Some(user_id)
}

/// Groups messages into one tree per thread, rooted at the thread's first
/// message, replies nested chronologically. Threads come back newest activity
/// first.
///
/// A message whose parent is not in `messages` is hung under its thread root.
pub fn build_threads(mut messages: Vec<Message>) -> Vec<ThreadNode> {
    messages.sort_by_key(|m| m.created_at);

    let mut threads: Vec<Uuid> = Vec::new();
    let mut by_thread: HashMap<Uuid, Vec<Message>> = HashMap::new();
    for message in messages {
        let bucket = by_thread.entry(message.thread_id).or_insert_with(|| {
            threads.push(message.thread_id);
            Vec::new()
        });
        bucket.push(message);
    }

    let mut trees: Vec<ThreadNode> = threads
        .into_iter()
        .filter_map(|thread_id| by_thread.remove(&thread_id))
        .filter_map(build_tree)
        .collect();

    trees.sort_by(|a, b| latest_activity(b).cmp(&latest_activity(a)));
    trees
}

fn latest_activity(node: &ThreadNode) -> chrono::DateTime<chrono::Utc> {
    node.iter()
        .map(|m| m.created_at)
        .max()
        .unwrap_or(node.message.created_at)
}

/// Builds one thread from chronologically sorted messages.
fn build_tree(messages: Vec<Message>) -> Option<ThreadNode> {
    let root_idx = messages
        .iter()
        .position(|m| m.parent_message_id.is_none())
        .unwrap_or(0);
    let root_id = messages.get(root_idx)?.id;

    let known: std::collections::HashSet<Uuid> = messages.iter().map(|m| m.id).collect();
    let mut children: HashMap<Uuid, Vec<Message>> = HashMap::new();
    let mut root = None;
    for (idx, message) in messages.into_iter().enumerate() {
        if idx == root_idx {
            root = Some(message);
            continue;
        }
        let parent = message
            .parent_message_id
            .filter(|p| known.contains(p) && *p != message.id)
            .unwrap_or(root_id);
        children.entry(parent).or_default().push(message);
    }

    attach_replies(root?, &mut children)
}

/// Attaches replies with an explicit stack so deep chains do not recurse.
fn attach_replies(root: Message, children: &mut HashMap<Uuid, Vec<Message>>) -> Option<ThreadNode> {
    // A node under construction plus its children not yet built.
    struct Frame {
        node: ThreadNode,
        pending: std::vec::IntoIter<Message>,
    }

    let pending = children.remove(&root.id).unwrap_or_default().into_iter();
    let mut stack = vec![Frame { node: ThreadNode { message: root, replies: Vec::new() }, pending }];

    loop {
        let next = stack.last_mut()?.pending.next();
        match next {
            Some(child) => {
                let pending = children.remove(&child.id).unwrap_or_default().into_iter();
                stack.push(Frame { node: ThreadNode { message: child, replies: Vec::new() }, pending });
            }
            None => {
                let done = stack.pop()?.node;
                match stack.last_mut() {
                    Some(parent) => parent.node.replies.push(done),
                    None => return Some(done),
                }
            }
        }
    }
}
