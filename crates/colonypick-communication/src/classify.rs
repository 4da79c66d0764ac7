//! Command classification
//!
//! Every submitted command string is routed onto exactly one lane. The
//! classifier is a pure function of the string: case-insensitive,
//! whitespace-normalized, and for multi-line commands decided by the first
//! motion directive.
//!
//! Combined-axis `G0/G1 X… Y…` moves get their own lane with the same
//! acknowledgment discipline as the single-axis lanes, so a sequence of
//! combined moves is strictly ordered and drain checks observe them.

/// Dispatch lane for a classified command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Single-axis X moves; acknowledgment gated
    X,
    /// Single-axis Y moves; acknowledgment gated
    Y,
    /// Combined-axis XY moves; acknowledgment gated
    Xy,
    /// Direct pin writes (`M42`); fire and forget
    Aux,
    /// Everything else (mode, home, query, reset); fire and forget
    Control,
}

impl Lane {
    /// All lanes, in worker spawn order
    pub const ALL: [Lane; 5] = [Lane::X, Lane::Y, Lane::Xy, Lane::Aux, Lane::Control];

    /// Whether this lane waits for an `ok` after each command
    pub fn is_gated(self) -> bool {
        matches!(self, Lane::X | Lane::Y | Lane::Xy)
    }

    /// Stable index into per-lane arrays
    pub fn index(self) -> usize {
        match self {
            Lane::X => 0,
            Lane::Y => 1,
            Lane::Xy => 2,
            Lane::Aux => 3,
            Lane::Control => 4,
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::X => write!(f, "x"),
            Lane::Y => write!(f, "y"),
            Lane::Xy => write!(f, "xy"),
            Lane::Aux => write!(f, "aux"),
            Lane::Control => write!(f, "control"),
        }
    }
}

/// Whether a line is a `G0`/`G1` move directive.
///
/// Accepts leading-zero spellings (`G00`, `G01`).
fn is_move_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    let Some(word) = tokens.next() else {
        return false;
    };
    let word = word.to_ascii_uppercase();
    let Some(number) = word.strip_prefix('G') else {
        return false;
    };
    matches!(number.parse::<u32>(), Ok(0) | Ok(1))
}

/// Whether a move line carries a word for the given axis letter
fn has_axis(line: &str, axis: char) -> bool {
    line.split_whitespace()
        .skip(1)
        .any(|word| word.starts_with(axis) || word.starts_with(axis.to_ascii_lowercase()))
}

/// Classify a command string onto its lane.
///
/// Total and stateless: every string maps to exactly one lane, ambiguity
/// falls through to [`Lane::Control`].
pub fn classify(command: &str) -> Lane {
    // First motion directive wins for multi-line commands.
    for line in command.lines() {
        let line = line.trim();
        if !is_move_line(line) {
            continue;
        }
        let x = has_axis(line, 'X');
        let y = has_axis(line, 'Y');
        return match (x, y) {
            (true, false) => Lane::X,
            (false, true) => Lane::Y,
            (true, true) => Lane::Xy,
            (false, false) => Lane::Control,
        };
    }

    let first = command
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    if first
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("M42"))
    {
        return Lane::Aux;
    }

    Lane::Control
}

/// Motion predicate: any line is a `G0`/`G1` move, or the command is a
/// relative jog pair. Used by queue scrubbing.
pub fn is_motion(command: &str) -> bool {
    command.lines().any(|line| is_move_line(line.trim())) || is_jog(command)
}

/// Jog predicate: a `G91` (relative mode) line followed by a `G1` move on
/// X or Y.
pub fn is_jog(command: &str) -> bool {
    let mut saw_relative = false;
    for line in command.lines() {
        let line = line.trim();
        let first = line.split_whitespace().next().unwrap_or("");
        if first.eq_ignore_ascii_case("G91") {
            saw_relative = true;
            continue;
        }
        if saw_relative && is_move_line(line) && (has_axis(line, 'X') || has_axis(line, 'Y')) {
            return true;
        }
    }
    false
}

/// Match-all predicate; `scrub(None)` is equivalent
pub fn is_any(_command: &str) -> bool {
    true
}
