// tests/property/session_test.rs

//! Property-based tests for the connection state machine
//! Tests that arbitrary server chatter never moves a session off the forward
//! path or triggers writes before it is active

use crate::test_helpers::*;
use mudlink::core::{ConnectionState, LineMatch, Link, Registries};
use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;

fn echo_registries() -> Registries {
    let mut registries = Registries::new();
    registries
        .register_trigger(".*", |link: Link, line: String, _m: LineMatch| async move {
            link.write(format!("echo {line}"))
        })
        .unwrap();
    registries
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_chatter_before_login_is_inert(
        before_prompt in vec("[a-z .,!]{0,30}", 0..8),
        while_authenticating in vec("[a-z .,!]{0,30}", 0..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new(echo_registries()).await;

            for line in &before_prompt {
                ctx.send(line).await;
            }
            ctx.send(LOGIN_PROMPT).await;
            assert_eq!(ctx.recv().await, CREDENTIALS);

            for line in &while_authenticating {
                ctx.send(line).await;
            }
            ctx.send(AUTH_SUCCESS).await;
            ctx.wait_for_state(ConnectionState::Active).await;

            // The first echo is of a line sent after activation.
            ctx.send("hello").await;
            assert_eq!(ctx.recv().await, "echo hello");
        });
    }

    #[test]
    fn test_active_lines_are_handled_in_order(lines in vec("[a-z0-9 ]{1,20}", 1..16)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new(echo_registries()).await;
            ctx.login().await;

            for line in &lines {
                ctx.send(line).await;
            }
            for line in &lines {
                assert_eq!(ctx.recv().await, format!("echo {line}"));
            }
            assert_eq!(ctx.try_recv(Duration::from_millis(20)).await, None);
            assert_eq!(ctx.link.state(), ConnectionState::Active);
        });
    }
}
