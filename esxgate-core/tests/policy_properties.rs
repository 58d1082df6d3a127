//! Property-based tests for the policy engine and timeout clamping
//!
//! These pin the invariants the gateway's security posture rests on:
//! validation is deterministic and total, dangerous metacharacters are
//! never admitted, and timeout clamping always lands in range.

use proptest::prelude::*;

use esxgate_core::{
    MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, PolicyEngine, ValidationReason, clamp_timeout_secs,
};

// ========== Generators ==========

/// Strategy for arbitrary command strings, printable ASCII
fn arb_command() -> impl Strategy<Value = String> {
    "[ -~]{0,80}"
}

/// Strategy for commands drawn from the safe character set
fn arb_safe_command() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._-]{1,60}"
}

/// Strategy for a shell metacharacter the engine must never admit
fn arb_metacharacter() -> impl Strategy<Value = char> {
    prop_oneof![
        Just(';'),
        Just('|'),
        Just('&'),
        Just('>'),
        Just('<'),
        Just('$'),
        Just('`'),
        Just('\\'),
    ]
}

// ========== Property Tests: PolicyEngine ==========

proptest! {
    /// Property: validation is total and deterministic
    #[test]
    fn validation_is_deterministic(command in arb_command()) {
        let engine = PolicyEngine::builtin();
        let first = engine.validate(&command);
        let second = engine.validate(&command);
        prop_assert_eq!(first.admitted, second.admitted);
        prop_assert_eq!(first.reason, second.reason);
    }

    /// Property: no admitted command carries a shell metacharacter
    #[test]
    fn admitted_commands_are_metacharacter_free(command in arb_command()) {
        let engine = PolicyEngine::builtin();
        let result = engine.validate(&command);
        if result.is_admitted() {
            for meta in [';', '|', '&', '>', '<', '$', '`', '\\', '#'] {
                prop_assert!(
                    !command.contains(meta),
                    "admitted command contains {meta:?}: {command}"
                );
            }
        }
    }

    /// Property: appending a metacharacter to any command never yields
    /// a prefix or charset admission
    #[test]
    fn metacharacter_suffix_is_never_prefix_admitted(
        command in arb_safe_command(),
        meta in arb_metacharacter(),
    ) {
        let engine = PolicyEngine::builtin();
        let tainted = format!("{command}{meta} reboot");
        let result = engine.validate(&tainted);
        prop_assert_ne!(result.reason, ValidationReason::PrefixMatch);
        if result.is_admitted() {
            // Only an exact catalog hit may admit, and the catalog holds
            // no metacharacters, so admission here is a contradiction
            prop_assert!(false, "tainted command admitted: {}", tainted);
        }
    }

    /// Property: safe-charset commands outside the catalog fall through
    /// to the not-allowlisted verdict, never to a charset complaint
    #[test]
    fn safe_charset_rejections_are_not_charset_complaints(command in arb_safe_command()) {
        let engine = PolicyEngine::builtin();
        let result = engine.validate(&command);
        prop_assert_ne!(result.reason, ValidationReason::InvalidCharacters);
    }

    /// Property: a denied verb stays denied under arbitrary safe arguments
    #[test]
    fn denied_verbs_are_denied_with_any_arguments(args in arb_safe_command()) {
        let engine = PolicyEngine::builtin();
        for verb in ["rm", "reboot", "shutdown", "chmod"] {
            // Guard against drift: the sampled verbs must be table entries
            prop_assert!(engine.tables().denied_commands.iter().any(|v| v == verb));
            let command = format!("{verb} {args}");
            let result = engine.validate(&command);
            prop_assert!(!result.is_admitted(), "{command}");
            prop_assert_eq!(result.reason, ValidationReason::Denied);
        }
    }
}

// ========== Property Tests: Timeout Clamping ==========

proptest! {
    /// Property: the clamp always lands inside the permitted range
    #[test]
    fn clamp_lands_in_range(requested in any::<i64>()) {
        let clamped = clamp_timeout_secs(requested);
        prop_assert!(clamped >= MIN_TIMEOUT_SECS);
        prop_assert!(clamped <= MAX_TIMEOUT_SECS);
    }

    /// Property: clamping is idempotent
    #[test]
    fn clamp_is_idempotent(requested in any::<i64>()) {
        let once = clamp_timeout_secs(requested);
        let twice = clamp_timeout_secs(i64::try_from(once).unwrap());
        prop_assert_eq!(once, twice);
    }

    /// Property: in-range requests pass through unchanged
    #[test]
    fn clamp_preserves_in_range_values(requested in 10_i64..=300) {
        let clamped = clamp_timeout_secs(requested);
        prop_assert_eq!(clamped, u64::try_from(requested).unwrap());
    }
}
