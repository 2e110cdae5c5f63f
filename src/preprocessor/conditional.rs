use rustc_hash::{FxHashMap, FxHashSet};

use crate::preprocessor::{DefineScopes, Feed, Truth, directive, expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arm {
    /// Provably live.
    Taken,
    /// Possibly live, the directive is kept.
    Uncertain,
    /// Provably dead, dropped.
    Dead,
}

#[derive(Debug)]
struct Group {
    /// Whether the region containing the group is live.
    parent_live: bool,
    arm: Arm,
    any_taken: bool,
    /// Whether a directive of this group was written to the output.
    emitted: bool,
    arm_skipped: usize,
    touched: FxHashSet<String>,
    taken_defines: Option<FxHashMap<String, Truth>>,
}

impl Group {
    fn dead_region() -> Self {
        Self {
            parent_live: false,
            arm: Arm::Dead,
            any_taken: false,
            emitted: false,
            arm_skipped: 0,
            touched: FxHashSet::default(),
            taken_defines: None,
        }
    }
}

/// Evaluator of `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif` over known defines.
///
/// Lines are fed one at a time. Provably true arms lose their directives, provably
/// false arms are replaced by a skip note, and undecidable groups are kept verbatim.
#[derive(Debug)]
pub struct ConditionalEvaluator {
    scopes: DefineScopes,
    groups: Vec<Group>,
    /// Texture usage by `PROP<NAME>` define.
    texture_usage: FxHashMap<String, bool>,
    skipped_lines: usize,
    diagnostics: Vec<String>,
}

impl ConditionalEvaluator {
    /// Create a new evaluator with known defines.
    pub fn new(seed: impl IntoIterator<Item = (String, bool)>) -> Self {
        Self {
            scopes: DefineScopes::new(seed),
            groups: Vec::new(),
            texture_usage: FxHashMap::default(),
            skipped_lines: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Resolve `defined(PROP<NAME>) || !defined(OPTIMIZER_ENABLED)` from whether the
    /// texture property `<name>` is used.
    pub fn with_texture_usage<'a>(
        mut self,
        usage: impl IntoIterator<Item = (&'a String, &'a bool)>,
    ) -> Self {
        self.texture_usage = usage
            .into_iter()
            .map(|(name, used)| (format!("PROP{}", name.to_uppercase()), *used))
            .collect();
        self
    }

    /// Whether the current line position is live.
    pub fn is_live(&self) -> bool {
        self.groups
            .last()
            .is_none_or(|group| group.parent_live && group.arm != Arm::Dead)
    }

    /// Get the number of open conditional groups.
    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    /// Get the total number of lines dropped.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Get the conditions which could not be decided.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Get whether `name` is defined.
    pub fn defined(&self, name: &str) -> Truth {
        self.scopes.get(name)
    }

    /// Evaluate a `#if` expression.
    pub fn evaluate(&self, expression: &str) -> Truth {
        if let Some(used) = expr::vendor_idiom_define(expression)
            .and_then(|define| self.texture_usage.get(define))
        {
            return Truth::from(*used);
        }

        expr::evaluate(expression, |name| self.scopes.get(name))
    }

    /// Feed one line.
    ///
    /// Directives and skip notes to keep are written to `out`. Returns [`Feed::Live`] if
    /// the line is live code the caller should handle, including `#define`/`#undef` and
    /// other non-conditional directives.
    pub fn feed(&mut self, line: &str, out: &mut Vec<String>) -> Feed {
        let Some((keyword, rest)) = directive(line) else {
            return self.live_or_skip();
        };

        match keyword {
            "if" => {
                let truth = self.evaluate_if_live(rest);
                self.open(truth, line, out)
            }
            "ifdef" => {
                let truth = self.scopes.get(rest.trim());
                self.open(truth, line, out)
            }
            "ifndef" => {
                let truth = !self.scopes.get(rest.trim());
                self.open(truth, line, out)
            }
            "elif" => self.alternative(Some(rest), out),
            "else" => self.alternative(None, out),
            "endif" => self.close(out),
            "define" | "undef" if self.is_live() => {
                if let Some(name) = rest
                    .trim_start()
                    .split(|c: char| c.is_whitespace() || c == '(')
                    .next()
                    && !name.is_empty()
                {
                    let state = Truth::from(keyword == "define");
                    self.scopes.set(name, state);
                }
                Feed::Live
            }
            _ => self.live_or_skip(),
        }
    }

    fn live_or_skip(&mut self) -> Feed {
        if self.is_live() {
            return Feed::Live;
        }

        if let Some(group) = self.groups.iter_mut().rev().find(|group| group.parent_live) {
            group.arm_skipped += 1;
        }
        Feed::Consumed
    }

    fn evaluate_if_live(&mut self, expression: &str) -> Truth {
        if !self.is_live() {
            return Truth::Unknown;
        }

        let truth = self.evaluate(expression);
        if truth == Truth::Unknown {
            self.diagnostics
                .push(format!("Kept undecidable condition: {}", expression.trim()));
        }
        truth
    }

    fn open(&mut self, truth: Truth, line: &str, out: &mut Vec<String>) -> Feed {
        if !self.is_live() {
            self.live_or_skip();
            self.groups.push(Group::dead_region());
            return Feed::Consumed;
        }

        self.scopes.push();
        let mut group = Group {
            parent_live: true,
            ..Group::dead_region()
        };

        match truth {
            Truth::True => {
                group.arm = Arm::Taken;
                group.any_taken = true;
            }
            Truth::False => group.arm = Arm::Dead,
            Truth::Unknown => {
                group.arm = Arm::Uncertain;
                group.emitted = true;
                out.push(line.to_string());
            }
        }

        self.groups.push(group);
        Feed::Consumed
    }

    /// Handle `#elif` (with an expression) or `#else`.
    fn alternative(&mut self, expression: Option<&str>, out: &mut Vec<String>) -> Feed {
        match self.groups.last() {
            None => return Feed::Live,
            Some(group) if !group.parent_live => return self.live_or_skip(),
            Some(..) => {}
        }

        self.close_arm(out);
        self.scopes.push();

        let any_taken = self.groups.last().is_some_and(|group| group.any_taken);
        let truth = match (any_taken, expression) {
            (true, _) => None,
            (false, Some(expression)) => Some(self.evaluate(expression)),
            (false, None) => Some(Truth::True),
        };

        if truth == Some(Truth::Unknown)
            && let Some(expression) = expression
        {
            self.diagnostics
                .push(format!("Kept undecidable condition: {}", expression.trim()));
        }

        let Some(group) = self.groups.last_mut() else {
            return Feed::Consumed;
        };

        match truth {
            None | Some(Truth::False) => group.arm = Arm::Dead,
            Some(Truth::True) => {
                if group.emitted {
                    out.push("#else".to_string());
                }
                group.arm = Arm::Taken;
                group.any_taken = true;
            }
            Some(Truth::Unknown) => {
                let expression = expression.unwrap_or_default().trim();
                out.push(match group.emitted {
                    true => format!("#elif {expression}"),
                    false => format!("#if {expression}"),
                });
                group.arm = Arm::Uncertain;
                group.emitted = true;
            }
        }

        Feed::Consumed
    }

    fn close(&mut self, out: &mut Vec<String>) -> Feed {
        match self.groups.last() {
            None => return Feed::Live,
            Some(group) if !group.parent_live => {
                self.groups.pop();
                return self.live_or_skip();
            }
            Some(..) => {}
        }

        self.close_arm(out);
        let Some(group) = self.groups.pop() else {
            return Feed::Consumed;
        };

        if group.emitted {
            out.push("#endif".to_string());
            for name in group.touched {
                self.scopes.set(name, Truth::Unknown);
            }
        } else if let Some(defines) = group.taken_defines {
            for (name, state) in defines {
                self.scopes.set(name, state);
            }
        }

        Feed::Consumed
    }

    /// Close the current arm of the innermost group.
    fn close_arm(&mut self, out: &mut Vec<String>) {
        let defines = self.scopes.pop();
        let Some(group) = self.groups.last_mut() else {
            return;
        };

        match group.arm {
            Arm::Taken => {
                group.touched.extend(defines.keys().cloned());
                if !group.emitted {
                    group.taken_defines = Some(defines);
                }
            }
            Arm::Uncertain => group.touched.extend(defines.into_keys()),
            Arm::Dead => {
                if group.arm_skipped > 0 {
                    out.push(format!("// {} lines skipped", group.arm_skipped));
                    self.skipped_lines += group.arm_skipped;
                    group.arm_skipped = 0;
                }
            }
        }
    }
}
