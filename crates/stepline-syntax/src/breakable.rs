//! Breakable line discovery.

use std::collections::{BTreeSet, VecDeque};

use crate::compiler::{compile, CodeUnit};
use crate::error::CompileError;

/// Lines at which execution can stop, over all units of the module.
pub fn compute_breakable_lines(source: &str) -> Result<BTreeSet<u32>, CompileError> {
    let module = compile(source)?;
    let mut lines = BTreeSet::new();
    let mut queue: VecDeque<&CodeUnit> = VecDeque::from([&module]);

    while let Some(unit) = queue.pop_front() {
        collect_unit_lines(unit, &mut lines);
        let mut nested: Vec<&CodeUnit> = unit.nested().collect();
        nested.sort_by_key(|nested| nested.first_line);
        for nested in nested.into_iter().rev() {
            queue.push_front(nested);
        }
    }
    Ok(lines)
}

/// First line, every line whose instructions span a non-empty address range,
/// and the line reached after the last step.
fn collect_unit_lines(unit: &CodeUnit, lines: &mut BTreeSet<u32>) {
    lines.insert(unit.first_line);
    let steps = unit.line_table.steps();
    let mut line = i64::from(unit.first_line);
    for (step, next) in steps.iter().zip(steps.iter().skip(1)) {
        line += i64::from(step.line_delta);
        if next.address_delta != 0 {
            insert_line(lines, line);
        }
    }
    if let Some(last) = steps.last() {
        line += i64::from(last.line_delta);
        insert_line(lines, line);
    }
}

fn insert_line(lines: &mut BTreeSet<u32>, line: i64) {
    if let Ok(line) = u32::try_from(line) {
        lines.insert(line);
    }
}

/// Line where a breakpoint requested at `user_line` should be placed.
///
/// Source that does not compile gets the requested line back unchanged.
/// When the request comes from inserting a line into an empty line, the
/// search prefers the next breakable line; otherwise it prefers the
/// previous one.
#[must_use]
pub fn nearest_breakable_line(
    user_line: u32,
    is_empty_line_insertion: bool,
    source: &str,
) -> Option<u32> {
    let lines = match compute_breakable_lines(source) {
        Ok(lines) => lines,
        Err(err) => {
            tracing::debug!("breakable lines unavailable: {err}");
            return Some(user_line);
        }
    };
    nearest_in(&lines, user_line, is_empty_line_insertion)
}

/// Same search over an already computed set.
#[must_use]
pub fn nearest_in(lines: &BTreeSet<u32>, user_line: u32, is_empty_line_insertion: bool) -> Option<u32> {
    if lines.contains(&user_line) {
        return Some(user_line);
    }
    if is_empty_line_insertion {
        lines
            .range(user_line..)
            .next()
            .or_else(|| lines.last())
            .copied()
    } else {
        lines
            .range(..=user_line)
            .next_back()
            .or_else(|| lines.first())
            .copied()
    }
}
