//! Property-based tests for output routing using proptest.

use jinjafx_render::{Destination, FxError, OutputRouter};
use proptest::prelude::*;

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    Open(String),
    Close,
}

fn piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Piece::Text),
        "[a-c]".prop_map(Piece::Open),
        Just(Piece::Close),
    ]
}

fn render(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| match p {
            Piece::Text(t) => t.clone(),
            Piece::Open(name) => format!("<output \"{}\">", name),
            Piece::Close => "</output>".to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether every close has an open and every open is closed.
fn balanced(pieces: &[Piece]) -> bool {
    let mut depth = 0i32;
    for p in pieces {
        match p {
            Piece::Open(_) => depth += 1,
            Piece::Close => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Piece::Text(_) => {}
        }
    }
    depth == 0
}

/// Drops closes with nothing open and closes whatever is left open, so any
/// piece sequence becomes a balanced one.
fn balance(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut depth = 0usize;
    let mut out = Vec::with_capacity(pieces.len());
    for p in pieces {
        match p {
            Piece::Close if depth == 0 => continue,
            Piece::Close => depth -= 1,
            Piece::Open(_) => depth += 1,
            Piece::Text(_) => {}
        }
        out.push(p);
    }
    out.extend(std::iter::repeat(Piece::Close).take(depth));
    out
}

fn balanced_pieces() -> impl Strategy<Value = Vec<Piece>> {
    prop::collection::vec(piece(), 0..20).prop_map(balance)
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Routing succeeds exactly when the tags balance.
    #[test]
    fn routing_succeeds_iff_balanced(pieces in prop::collection::vec(piece(), 0..20)) {
        let mut router = OutputRouter::new();
        let result = router.route(Destination::new("_stdout_"), &render(&pieces));
        if balanced(&pieces) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(FxError::UnbalancedOutputTags)));
        }
    }

    /// Balanced routing loses no text lines.
    #[test]
    fn routing_keeps_every_line(pieces in balanced_pieces()) {
        prop_assert!(balanced(&pieces));
        let mut router = OutputRouter::new();
        router.route(Destination::new("_stdout_"), &render(&pieces)).unwrap();

        let routed: usize = router.finish().iter().map(|(_, o)| o.lines.len()).sum();
        let texts = pieces.iter().filter(|p| matches!(p, Piece::Text(_))).count();
        prop_assert_eq!(routed, texts);
    }

    /// Repeating a row body repeats every destination's lines in row order.
    #[test]
    fn rows_append_in_order(rows in 1usize..6, name in "[a-z]{1,6}") {
        let mut router = OutputRouter::new();
        for row in 0..rows {
            let body = format!("<output \"{}\">\nline{}\n</output>", name, row);
            router.route(Destination::new("_stdout_"), &body).unwrap();
        }
        let outputs = router.finish();
        let expected: Vec<String> = (0..rows).map(|r| format!("line{}", r)).collect();
        prop_assert_eq!(&outputs.get(&name).unwrap().lines, &expected);
    }
}
