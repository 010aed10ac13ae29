mod common;

use common::PipelineHarness;
use content_board::credentials::{CredentialStore, hash_password};
use content_board::error::AuthError;
use content_board::models::{AdminCredential, UiEvent};
use content_board::session::{
    AdminGate, Authorized, FileSessionSlot, MemorySessionSlot, RestoreOutcome, SessionSlot,
};
use std::sync::Arc;
use tempfile::TempDir;

struct GateHarness {
    pipeline: PipelineHarness,
    slot: Arc<MemorySessionSlot>,
    gate: AdminGate,
}

fn gate_with(slot: MemorySessionSlot) -> GateHarness {
    let pipeline = PipelineHarness::live();
    let slot = Arc::new(slot);
    let credentials = Arc::new(CredentialStore::from_credentials([AdminCredential {
        id: "alice".to_string(),
        password_hash: hash_password("correct"),
    }]));

    let gate = AdminGate::new(
        credentials,
        pipeline.pipeline.structured().clone(),
        slot.clone(),
        pipeline.renderer.clone(),
    );

    GateHarness {
        pipeline,
        slot,
        gate,
    }
}

async fn live_gate() -> GateHarness {
    let h = gate_with(MemorySessionSlot::new());
    h.pipeline.pipeline.structured().initialize().await.unwrap();
    h
}

#[cfg(test)]
mod login_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_success_signs_in_and_persists() {
        let h = live_gate().await;

        let authorized = h.gate.login("alice", "correct").await.unwrap();

        assert_eq!(authorized.admin_id, "alice");
        assert!(h.gate.is_signed_in());
        assert_eq!(h.gate.current_admin().as_deref(), Some("alice"));
        assert_eq!(h.slot.peek().as_deref(), Some("alice"));
        assert!(h.pipeline.renderer.events().contains(&UiEvent::SessionStateChanged {
            signed_in: true,
            admin_id: Some("alice".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_wrong_password_stays_signed_out() {
        let h = live_gate().await;

        let result = h.gate.login("alice", "wrong").await;

        assert_eq!(result, Err(AuthError::WrongPassword));
        assert!(!h.gate.is_signed_in());
        assert_eq!(h.slot.peek(), None);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let h = live_gate().await;
        assert_eq!(
            h.gate.login("mallory", "correct").await,
            Err(AuthError::UnknownId)
        );
    }

    #[tokio::test]
    async fn test_login_requires_live_store() {
        let h = gate_with(MemorySessionSlot::new());

        assert_eq!(
            h.gate.login("alice", "correct").await,
            Err(AuthError::StoreUnavailable)
        );
        assert!(!h.gate.is_signed_in());
    }
}

#[cfg(test)]
mod restore_tests {
    use super::*;

    #[tokio::test]
    async fn test_restore_known_id_without_password() {
        let h = gate_with(MemorySessionSlot::with_value("alice"));

        let outcome = h.gate.restore_from_slot().await;

        assert_eq!(
            outcome,
            RestoreOutcome::Authorized(Authorized {
                admin_id: "alice".to_string()
            })
        );
        assert!(h.gate.is_signed_in());
    }

    #[tokio::test]
    async fn test_restore_unknown_id_clears_slot() {
        let h = gate_with(MemorySessionSlot::with_value("bob"));

        let outcome = h.gate.restore_session("bob").await;

        assert_eq!(outcome, RestoreOutcome::Cleared);
        assert_eq!(h.slot.peek(), None);
        assert!(!h.gate.is_signed_in());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let h = live_gate().await;
        h.gate.login("alice", "correct").await.unwrap();

        h.gate.logout().await;

        assert!(!h.gate.is_signed_in());
        assert_eq!(h.slot.peek(), None);
        assert_eq!(h.gate.authorize_create(), Err(AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_authorize_create_after_login() {
        let h = live_gate().await;
        assert_eq!(h.gate.authorize_create(), Err(AuthError::NotSignedIn));

        h.gate.login("alice", "correct").await.unwrap();

        assert_eq!(
            h.gate.authorize_create().map(|a| a.admin_id),
            Ok("alice".to_string())
        );
    }
}

#[cfg(test)]
mod file_slot_tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let slot = FileSessionSlot::new(dir.path().join("session"), "secret");

        assert_eq!(slot.load().await, None);
        slot.store("alice").await;
        assert_eq!(slot.load().await.as_deref(), Some("alice"));

        slot.clear().await;
        assert_eq!(slot.load().await, None);
        // Clearing an absent slot is fine.
        slot.clear().await;
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session");

        FileSessionSlot::new(&path, "secret-a").store("alice").await;

        let other = FileSessionSlot::new(&path, "secret-b");
        assert_eq!(other.load().await, None);
    }

    #[tokio::test]
    async fn test_hand_edited_slot_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session");
        std::fs::write(&path, "alice").unwrap();

        let slot = FileSessionSlot::new(&path, "secret");
        assert_eq!(slot.load().await, None);
    }
}
