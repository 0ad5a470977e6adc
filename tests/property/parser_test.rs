// tests/property/parser_test.rs

//! Property-based tests for the command grammar
//! Tests that encoded commands parse back unchanged and that malformed input
//! never panics or leaks into the keyword arguments

use mudlink::core::commands::{KwargValue, Kwargs, ParsedCommand};
use mudlink::core::protocol::ProtocolConstants;
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = KwargValue> {
    prop_oneof![
        "[a-zA-Z0-9 #.,:!-]{0,16}".prop_map(KwargValue::Text),
        vec("[a-zA-Z0-9#]{1,8}", 0..5).prop_map(KwargValue::List),
    ]
}

fn command_strategy() -> impl Strategy<Value = ParsedCommand> {
    (
        "[a-z][a-z0-9_]{0,15}",
        "#[0-9]{1,6}",
        btree_map("[a-z][a-z0-9_]{0,10}", value_strategy(), 0..6),
    )
        .prop_map(|(token, invoker, pairs)| {
            ParsedCommand::new(token, invoker, pairs.into_iter().collect::<Kwargs>())
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_encode_parse_roundtrip(cmd in command_strategy()) {
        let protocol = ProtocolConstants::default();
        let line = cmd.encode(&protocol);
        prop_assert_eq!(ParsedCommand::parse(&line, &protocol), Some(cmd));
    }

    #[test]
    fn test_roundtrip_with_custom_delimiters(cmd in command_strategy()) {
        let protocol = ProtocolConstants::new("%%", "<K>", "<L>");
        let line = cmd.encode(&protocol);
        prop_assert_eq!(ParsedCommand::parse(&line, &protocol), Some(cmd));
    }

    #[test]
    fn test_lines_without_prefix_never_parse(line in "[^@].{0,64}") {
        prop_assert!(ParsedCommand::parse(&line, &ProtocolConstants::default()).is_none());
    }

    #[test]
    fn test_arbitrary_command_lines_never_panic(body in ".{0,128}") {
        let protocol = ProtocolConstants::default();
        let line = format!("@@{body}");
        let cmd = ParsedCommand::parse(&line, &protocol).unwrap();
        // Every surviving pair has a non-empty key.
        for (key, _) in &cmd.kwargs {
            prop_assert!(!key.is_empty());
        }
        prop_assert!(!cmd.token.contains(protocol.kwarg_delimiter.as_str()));
    }

    #[test]
    fn test_garbage_segments_do_not_disturb_good_ones(
        cmd in command_strategy(),
        junk in vec("[a-z ]{0,8}", 1..4),
    ) {
        let protocol = ProtocolConstants::default();
        let mut line = cmd.encode(&protocol);
        for segment in &junk {
            line.push_str(&protocol.kwarg_delimiter);
            line.push_str(segment);
        }
        prop_assert_eq!(ParsedCommand::parse(&line, &protocol), Some(cmd));
    }
}
