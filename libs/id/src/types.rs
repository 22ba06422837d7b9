//! Typed id definitions for the allocator's entities.
//!
//! Only entities the coordinator generates ids for live here. Roles are
//! operator-named paths and have their own validated type in `role.rs`.

use crate::define_id;

// =============================================================================
// Cluster Entities
// =============================================================================

define_id!(AgentId, "agent");
define_id!(FrameworkId, "fw");

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_roundtrip() {
        let id = AgentId::generate();
        let parsed: AgentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_agent_id_prefix() {
        assert!(AgentId::generate().to_string().starts_with("agent_"));
        assert!(FrameworkId::generate().to_string().starts_with("fw_"));
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let framework = FrameworkId::generate().to_string();
        let result: Result<AgentId, _> = framework.parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::WrongPrefix { expected: "agent", .. }
        ));
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<AgentId, _> = "agent01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::MissingSeparator));
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<AgentId, _> = "agent_notaulid".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_empty_rejected() {
        let result: Result<FrameworkId, _> = "".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::Empty));
    }

    #[test]
    fn test_json_roundtrip() {
        let id = FrameworkId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: FrameworkId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_sort_by_creation_time() {
        let first = AgentId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = AgentId::generate();
        assert!(first < second);
    }
}
