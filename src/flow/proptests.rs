//! Property-based tests for the flow engine
//!
//! These tests verify key invariants hold across generated configurations,
//! including ones with dangling targets and cycles.

use super::testing::config;
use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Targets range past the node count so some transitions dangle
fn arb_target(node_count: usize) -> impl Strategy<Value = String> {
    (0..node_count + 2).prop_map(|i| format!("n{i}"))
}

fn arb_branch_key() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), (0..3usize).prop_map(|i| format!("o{i}"))]
}

fn arb_next(node_count: usize) -> impl Strategy<Value = Option<NextStep>> {
    prop_oneof![
        Just(None),
        arb_target(node_count).prop_map(|t| Some(NextStep::Node(t))),
        proptest::collection::btree_map(arb_branch_key(), arb_target(node_count), 0..4)
            .prop_map(|map| Some(NextStep::Branch(map))),
    ]
}

fn arb_node(index: usize, node_count: usize) -> impl Strategy<Value = QuestionNode> {
    (any::<bool>(), 1..4usize, arb_next(node_count), any::<bool>()).prop_map(
        move |(is_choice, option_count, next, required)| QuestionNode {
            id: format!("n{index}"),
            question: format!("Question {index}?"),
            kind: if is_choice {
                NodeKind::MultipleChoice
            } else {
                NodeKind::Text
            },
            required,
            options: if is_choice {
                (0..option_count)
                    .map(|i| AnswerOption::plain(format!("o{i}")))
                    .collect()
            } else {
                vec![]
            },
            next,
            triggers: vec![],
        },
    )
}

fn arb_config() -> impl Strategy<Value = BotConfiguration> {
    (1..8usize)
        .prop_flat_map(|n| (0..n).map(|i| arb_node(i, n)).collect::<Vec<_>>())
        .prop_map(config)
}

fn arb_terminal_config() -> impl Strategy<Value = BotConfiguration> {
    arb_config().prop_map(|mut cfg| {
        for node in &mut cfg.flows {
            node.next = None;
        }
        cfg
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn valid_answer(cfg: &BotConfiguration, session: &ConversationSession, pick: usize) -> String {
    let node = session
        .current_node
        .as_deref()
        .and_then(|id| cfg.node(id))
        .expect("live session points at a node");
    if node.kind.is_choice() {
        node.options[pick % node.options.len()].value.clone()
    } else {
        format!("answer {pick}")
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: without any `next`, the first answer ends the session
    #[test]
    fn prop_no_transitions_ends_after_one_answer(cfg in arb_terminal_config(), pick in any::<usize>()) {
        let session = start(&cfg);
        let answer = valid_answer(&cfg, &session, pick);
        let result = advance(&cfg, &session, &answer);
        prop_assert!(result.is_ok(), "Valid answer rejected: {:?}", result);
        let result = result.unwrap();
        prop_assert!(result.terminated);
        prop_assert!(result.session.terminated);
        prop_assert_eq!(result.session.answers.len(), 1);
    }

    // Invariant 2: valid answers reach the end within N steps, cycles included
    #[test]
    fn prop_terminates_within_node_count(
        cfg in arb_config(),
        picks in proptest::collection::vec(any::<usize>(), 16)
    ) {
        let mut session = start(&cfg);
        let mut steps = 0;
        while !session.terminated {
            prop_assert!(steps < cfg.flows.len(), "Exceeded {} steps", cfg.flows.len());
            let answer = valid_answer(&cfg, &session, picks[steps]);
            let result = advance(&cfg, &session, &answer);
            prop_assert!(result.is_ok(), "Valid answer rejected: {:?}", result);
            let result = result.unwrap();
            prop_assert_eq!(result.terminated, result.session.terminated);
            session = result.session;
            steps += 1;
        }
        prop_assert!(steps >= 1);
        prop_assert!(steps <= cfg.flows.len());
    }

    // Invariant 3: resubmitting the same answer never changes the session
    #[test]
    fn prop_resubmission_is_noop(cfg in arb_config(), pick in any::<usize>()) {
        let session = start(&cfg);
        let answer = valid_answer(&cfg, &session, pick);
        let first = advance(&cfg, &session, &answer).unwrap();
        let answered_node = session.current_node.clone().unwrap();

        // Replaying against the advanced session
        let replay = advance(&cfg, &first.session, &answer);
        if first.terminated {
            prop_assert_eq!(replay, Err(AdvanceError::SessionEnded));
        } else {
            prop_assert_ne!(first.session.current_node.as_deref(), Some(answered_node.as_str()));
        }

        // Replaying against a session that still points at the answered node
        let mut stale = first.session.clone();
        stale.current_node = Some(answered_node.clone());
        stale.terminated = false;
        prop_assert_eq!(
            advance(&cfg, &stale, &answer),
            Err(AdvanceError::AlreadyAnswered(answered_node))
        );
    }

    // Invariant 4: a blank answer never moves a required node's pointer
    #[test]
    fn prop_required_blank_never_moves(cfg in arb_config(), blank in "[ \t]{0,4}") {
        let mut cfg = cfg;
        cfg.flows[0].required = true;
        let session = start(&cfg);
        let result = advance(&cfg, &session, &blank);
        prop_assert_eq!(result, Err(AdvanceError::AnswerRequired("n0".to_string())));
    }

    // Invariant 5: the engine is deterministic
    #[test]
    fn prop_advance_is_deterministic(cfg in arb_config(), pick in any::<usize>()) {
        let session = start(&cfg);
        let answer = valid_answer(&cfg, &session, pick);
        prop_assert_eq!(advance(&cfg, &session, &answer), advance(&cfg, &session, &answer));
    }
}
