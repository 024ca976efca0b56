use crate::domain::{Item, ItemKey, Session, matches};

/// Sessions whose name matches `filter`, each followed by its windows when
/// expanded. Filtering is on session names only.
pub fn flatten_sessions(sessions: &[Session], filter: &str) -> Vec<Item> {
    let mut items = Vec::new();
    for (session_index, session) in sessions.iter().enumerate() {
        if !matches(&session.name, filter) {
            continue;
        }
        items.push(Item::Session { session_index });
        if session.expanded {
            items.extend(
                (0..session.windows.len()).map(|window_index| Item::Window {
                    session_index,
                    window_index,
                }),
            );
        }
    }
    items
}

pub fn item_key(sessions: &[Session], item: Item) -> Option<ItemKey> {
    match item {
        Item::Session { session_index } => sessions
            .get(session_index)
            .map(|session| ItemKey::session(session.name.clone())),
        Item::Window {
            session_index,
            window_index,
        } => {
            let session = sessions.get(session_index)?;
            let window = session.windows.get(window_index)?;
            Some(ItemKey::window(session.name.clone(), window.index))
        }
    }
}

/// Position of `key` in `items`. A window that no longer appears falls back
/// to its owning session.
pub fn position_of(sessions: &[Session], items: &[Item], key: &ItemKey) -> Option<usize> {
    let exact = items
        .iter()
        .position(|item| item_key(sessions, *item).as_ref() == Some(key));
    if exact.is_some() || key.window.is_none() {
        return exact;
    }
    let owner = key.owning_session();
    items
        .iter()
        .position(|item| item_key(sessions, *item).as_ref() == Some(&owner))
}

/// Expands one session and collapses all others.
pub fn expand_exclusive(sessions: &mut [Session], session_index: usize) {
    for (index, session) in sessions.iter_mut().enumerate() {
        session.expanded = index == session_index;
    }
}
