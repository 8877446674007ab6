//! Command dispatch
//!
//! Applies one decoded frame against the registry and works out who
//! should be told what. No I/O happens here; the server actor encodes and
//! delivers the returned notices.

use tracing::info;

use crate::codec::MAX_TEXT_BYTES;
use crate::error::AppError;
use crate::message::{Frame, Notice};
use crate::registry::Registry;
use crate::types::{ClientId, Username};

/// A notice and its audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Every registered connection, in registry order
    Everyone(Notice),
    /// A single connection
    To(ClientId, Notice),
}

/// Apply `frame` sent by `sender`
///
/// Recoverable failures (taken names, unknown recipients, ...) become
/// private notices to the sender. An `Err` means the sender is not
/// registered or the registry is inconsistent.
pub fn dispatch(
    registry: &mut Registry,
    sender: ClientId,
    frame: Frame,
) -> Result<Vec<Delivery>, AppError> {
    let sender_name = registry
        .name_of(sender)
        .cloned()
        .ok_or(AppError::UnknownClient(sender))?;

    let deliveries = match frame {
        Frame::Broadcast { text } => broadcast(sender, &sender_name, &text),
        Frame::Direct { recipient, text } => {
            direct(registry, sender, &sender_name, &recipient, &text)
        }
        Frame::Rename { name } => rename(registry, sender, &sender_name, name)?,
        Frame::ListUsers => {
            info!("{} used the list users command.", sender_name);
            vec![Delivery::To(sender, Notice::user_list(&registry.snapshot()))]
        }
        Frame::Help => {
            info!("{} used the help command.", sender_name);
            vec![Delivery::To(sender, Notice::help())]
        }
    };
    Ok(deliveries)
}

fn broadcast(sender: ClientId, sender_name: &Username, text: &str) -> Vec<Delivery> {
    let notice = Notice::chat(sender_name, text);
    if notice.as_str().len() > MAX_TEXT_BYTES {
        info!("{} sent a message too long to relay.", sender_name);
        return vec![Delivery::To(sender, AppError::MessageTooLong.into())];
    }
    info!("{}", notice.as_str());
    vec![Delivery::Everyone(notice)]
}

fn direct(
    registry: &Registry,
    sender: ClientId,
    sender_name: &Username,
    recipient: &str,
    text: &str,
) -> Vec<Delivery> {
    if sender_name.as_str() == recipient {
        info!("{} tried to direct message themselves.", sender_name);
        return vec![Delivery::To(sender, AppError::SelfMessage.into())];
    }

    let Some((recipient_id, recipient_name)) = registry
        .lookup_by_name(recipient)
        .and_then(|id| registry.name_of(id).map(|name| (id, name)))
    else {
        info!(
            "{} tried to direct message {} but that user is not online.",
            sender_name, recipient
        );
        return vec![Delivery::To(
            sender,
            AppError::RecipientNotFound(recipient.to_string()).into(),
        )];
    };

    let notice = Notice::direct(sender_name, recipient_name, text);
    if notice.as_str().len() > MAX_TEXT_BYTES {
        return vec![Delivery::To(sender, AppError::MessageTooLong.into())];
    }
    info!("{}", notice.as_str());
    vec![
        Delivery::To(recipient_id, notice.clone()),
        Delivery::To(sender, notice),
    ]
}

fn rename(
    registry: &mut Registry,
    sender: ClientId,
    sender_name: &Username,
    name: String,
) -> Result<Vec<Delivery>, AppError> {
    let new_name = match Username::parse(name) {
        Ok(new_name) => new_name,
        Err(err) => {
            info!("{} tried to change their name to an invalid one: {}", sender_name, err);
            return Ok(vec![Delivery::To(sender, err.into())]);
        }
    };

    match registry.rename(sender, new_name.clone()) {
        Ok(old_name) => {
            let notice = Notice::renamed(&old_name, &new_name);
            info!("{}", notice.as_str());
            Ok(vec![Delivery::Everyone(notice)])
        }
        Err(err @ AppError::NameTaken(_)) => {
            info!(
                "{} tried to change their name to {} but it was already taken.",
                sender_name, new_name
            );
            Ok(vec![Delivery::To(sender, err.into())])
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        registry: Registry,
        alice: ClientId,
        bob: ClientId,
    }

    fn fixture() -> Fixture {
        let mut registry = Registry::new();
        let alice = ClientId::new();
        let bob = ClientId::new();
        registry
            .register(alice, Username::parse("alice").unwrap())
            .unwrap();
        registry
            .register(bob, Username::parse("bob").unwrap())
            .unwrap();
        Fixture {
            registry,
            alice,
            bob,
        }
    }

    fn private(to: ClientId, text: &str) -> Delivery {
        Delivery::To(to, Notice(text.to_string()))
    }

    #[test]
    fn test_broadcast_goes_to_everyone() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.alice,
            Frame::Broadcast {
                text: "hello".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            vec![Delivery::Everyone(Notice("alice: hello".to_string()))]
        );
    }

    #[test]
    fn test_direct_reaches_recipient_and_sender() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.alice,
            Frame::Direct {
                recipient: "bob".to_string(),
                text: "hey".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                private(f.bob, "alice > bob: hey"),
                private(f.alice, "alice > bob: hey"),
            ]
        );
    }

    #[test]
    fn test_direct_to_self_is_rejected_privately() {
        let mut f = fixture();
        let before = f.registry.snapshot();
        let out = dispatch(
            &mut f.registry,
            f.alice,
            Frame::Direct {
                recipient: "alice".to_string(),
                text: "hey".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            vec![private(
                f.alice,
                "You cannot send a private message to yourself."
            )]
        );
        assert_eq!(f.registry.snapshot(), before);
    }

    #[test]
    fn test_direct_to_missing_user() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.alice,
            Frame::Direct {
                recipient: "carol".to_string(),
                text: "hey".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            vec![private(f.alice, "There is no user with the name carol")]
        );
    }

    #[test]
    fn test_rename_broadcasts_change() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.bob,
            Frame::Rename {
                name: "robert".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            out,
            vec![Delivery::Everyone(Notice(
                "bob renamed themselves to robert".to_string()
            ))]
        );
        assert_eq!(f.registry.lookup_by_name("robert"), Some(f.bob));
    }

    #[test]
    fn test_rename_collision_is_private() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.bob,
            Frame::Rename {
                name: "alice".to_string(),
            },
        )
        .unwrap();
        assert_eq!(out, vec![private(f.bob, "That name has already been taken.")]);
        assert_eq!(f.registry.name_of(f.bob).unwrap().as_str(), "bob");
    }

    #[test]
    fn test_rename_validates_format() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.bob,
            Frame::Rename {
                name: "b o b".to_string(),
            },
        )
        .unwrap();
        assert!(matches!(&out[..], [Delivery::To(id, notice)]
            if *id == f.bob && notice.as_str().starts_with("Invalid name.")));
        assert_eq!(f.registry.name_of(f.bob).unwrap().as_str(), "bob");
    }

    #[test]
    fn test_list_users_is_idempotent() {
        let mut f = fixture();
        let first = dispatch(&mut f.registry, f.alice, Frame::ListUsers).unwrap();
        let second = dispatch(&mut f.registry, f.alice, Frame::ListUsers).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![private(f.alice, "Connected Users:\nalice\nbob\n")]);
    }

    #[test]
    fn test_help_is_private() {
        let mut f = fixture();
        let out = dispatch(&mut f.registry, f.bob, Frame::Help).unwrap();
        assert_eq!(out, vec![Delivery::To(f.bob, Notice::help())]);
    }

    #[test]
    fn test_oversized_chat_line_is_refused() {
        let mut f = fixture();
        let out = dispatch(
            &mut f.registry,
            f.alice,
            Frame::Broadcast {
                text: "a".repeat(MAX_TEXT_BYTES),
            },
        )
        .unwrap();
        assert_eq!(out, vec![private(f.alice, "Your message was too long to send.")]);
    }

    #[test]
    fn test_unregistered_sender_is_an_error() {
        let mut f = fixture();
        let stranger = ClientId::new();
        let err = dispatch(&mut f.registry, stranger, Frame::Help).unwrap_err();
        assert!(matches!(err, AppError::UnknownClient(id) if id == stranger));
    }
}
