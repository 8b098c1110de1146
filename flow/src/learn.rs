// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The `learn` action's nested flow template.

use std::fmt::Write;

use crate::action::{Action, ActionError};
use crate::matches::Match;

/// The flow template carried by a `learn(...)` action.
///
/// A learned flow is a restricted [`crate::Flow`]: its matches describe the
/// rule that will be installed when the template fires, and its actions are
/// limited to the small grammar OVS accepts inside `learn` (`load`,
/// `output:<port>`, `output:<field>`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LearnedFlow {
    /// Priority of the learned rule.
    pub priority: u16,
    /// Ingress port match of the learned rule, zero to omit.
    pub in_port: u32,
    /// Matches of the learned rule.
    pub matches: Vec<Match>,
    /// Table the learned rule is installed into.
    pub table: u8,
    /// Idle timeout of the learned rule, in seconds.
    pub idle_timeout: u16,
    /// Hard timeout applied when a TCP FIN is seen, in seconds.
    pub fin_hard_timeout: u16,
    /// Hard timeout of the learned rule, in seconds.
    pub hard_timeout: u16,
    /// Maximum number of learned rules, zero for unlimited.
    pub limit: u64,
    /// Cookie of the learned rule.
    pub cookie: u64,
    /// Delete the learned rules when this one expires.
    pub delete_learned: bool,
    /// Actions of the learned rule, restricted to the learn grammar.
    pub actions: Vec<Action>,
}

impl LearnedFlow {
    /// Renders the full `learn(...)` action.
    ///
    /// Emission order is fixed: priority, matches, table, timeouts, limit,
    /// `delete_learned`, actions.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidLearnedActions`] when an action outside
    /// the learn grammar is present, or the underlying error when a match or
    /// action fails to render.
    pub fn marshal(&self) -> Result<String, ActionError> {
        let mut out = String::from("learn(");
        let _ = write!(out, "priority={}", self.priority);
        if self.in_port != 0 {
            let _ = write!(out, ",in_port={}", self.in_port);
        }

        for m in &self.matches {
            let t = m
                .marshal()
                .map_err(|_| ActionError::InvalidLearnedActions)?;
            let _ = write!(out, ",{t}");
        }

        let _ = write!(
            out,
            ",table={},idle_timeout={},fin_hard_timeout={},hard_timeout={}",
            self.table, self.idle_timeout, self.fin_hard_timeout, self.hard_timeout
        );
        if self.limit > 0 {
            let _ = write!(out, ",limit={}", self.limit);
        }
        if self.cookie > 0 {
            let _ = write!(out, ",cookie={:#018x}", self.cookie);
        }
        if self.delete_learned {
            out.push_str(",delete_learned");
        }

        for a in &self.actions {
            if !is_learned_action(a) {
                return Err(ActionError::InvalidLearnedActions);
            }
            let t = a.marshal()?;
            let _ = write!(out, ",{t}");
        }

        out.push(')');
        Ok(out)
    }
}

/// Reports whether an action may appear inside a learned flow.
fn is_learned_action(a: &Action) -> bool {
    matches!(
        a,
        Action::Load { .. } | Action::Output(_) | Action::OutputField(_)
    )
}
