use serde::{Deserialize, Serialize};

/// The two independent actors who can hide a record from their own view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Customer,
    Admin,
}

/// Dual-consent soft-delete flags shared by orders and return requests.
///
/// Each party's delete action only ever sets their own flag; a record is
/// eligible for permanent deletion iff both flags are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub hidden_from_user: bool,
    pub hidden_from_admin: bool,
}

impl Visibility {
    /// Soft-delete on behalf of one party. `in_terminal_status` is the
    /// caller's judgement of whether the entity has finished its lifecycle;
    /// hiding an in-flight entity is rejected.
    pub fn hide(&mut self, party: Party, in_terminal_status: bool) -> Result<(), VisibilityError> {
        if !in_terminal_status {
            return Err(VisibilityError::NotEligibleForDeletion(
                "entity is still in flight".to_string(),
            ));
        }
        match party {
            Party::Customer => self.hidden_from_user = true,
            Party::Admin => self.hidden_from_admin = true,
        }
        Ok(())
    }

    pub fn visible_to(&self, party: Party) -> bool {
        match party {
            Party::Customer => !self.hidden_from_user,
            Party::Admin => !self.hidden_from_admin,
        }
    }

    /// Permanent deletion is allowed only once both parties have hidden
    /// the record.
    pub fn purge_eligible(&self) -> bool {
        self.hidden_from_user && self.hidden_from_admin
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisibilityError {
    #[error("Not eligible for deletion: {0}")]
    NotEligibleForDeletion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flag_never_purges() {
        let mut vis = Visibility::default();
        vis.hide(Party::Customer, true).unwrap();

        assert!(!vis.purge_eligible());
        assert!(!vis.visible_to(Party::Customer));
        assert!(vis.visible_to(Party::Admin));
    }

    #[test]
    fn test_dual_consent_purges() {
        let mut vis = Visibility::default();
        vis.hide(Party::Customer, true).unwrap();
        vis.hide(Party::Admin, true).unwrap();

        assert!(vis.purge_eligible());
    }

    #[test]
    fn test_in_flight_rejected() {
        let mut vis = Visibility::default();
        let result = vis.hide(Party::Admin, false);

        assert!(matches!(
            result,
            Err(VisibilityError::NotEligibleForDeletion(_))
        ));
        assert!(vis.visible_to(Party::Admin));
    }

    #[test]
    fn test_hide_is_idempotent() {
        let mut vis = Visibility::default();
        vis.hide(Party::Admin, true).unwrap();
        vis.hide(Party::Admin, true).unwrap();

        assert!(!vis.hidden_from_user);
        assert!(vis.hidden_from_admin);
    }
}
