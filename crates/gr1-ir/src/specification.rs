use gr1_dsl::ast::FormulaExpr;
use gr1_dsl::errors::ParseError;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::expr::{lower, Atom, Expr, Scope, Tense};
use crate::valuation::{Snapshot, MAX_PLAYER_VARS};

/// The two players of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Player {
    Env,
    Sys,
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Env => write!(f, "environment"),
            Player::Sys => write!(f, "system"),
        }
    }
}

/// One of the six predicate sections of a GR(1) specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Section {
    EnvInit,
    EnvSafe,
    EnvProg,
    SysInit,
    SysSafe,
    SysProg,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::EnvInit,
        Section::EnvSafe,
        Section::EnvProg,
        Section::SysInit,
        Section::SysSafe,
        Section::SysProg,
    ];

    pub fn player(self) -> Player {
        match self {
            Section::EnvInit | Section::EnvSafe | Section::EnvProg => Player::Env,
            Section::SysInit | Section::SysSafe | Section::SysProg => Player::Sys,
        }
    }

    pub fn is_justice(self) -> bool {
        matches!(self, Section::EnvProg | Section::SysProg)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::EnvInit => "env_init",
            Section::EnvSafe => "env_safe",
            Section::EnvProg => "env_prog",
            Section::SysInit => "sys_init",
            Section::SysSafe => "sys_safe",
            Section::SysProg => "sys_prog",
        };
        write!(f, "{s}")
    }
}

/// Malformed specification.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Parse error in {section}: {source}")]
    Parse {
        section: Section,
        #[source]
        source: ParseError,
    },
    #[error("Variable(s) declared for both environment and system: {}", .names.join(", "))]
    OverlappingVariables { names: Vec<String> },
    #[error("Variable '{name}' declared more than once")]
    DuplicateVariable { name: String },
    #[error("Too many {player} variables: {count} declared, at most {max} supported")]
    TooManyVariables {
        player: Player,
        count: usize,
        max: usize,
    },
    #[error("Undeclared variable '{name}' in {section}")]
    UndeclaredVariable { section: Section, name: String },
    #[error("Variable '{name}' clashes with a transition-system proposition of the same name")]
    NameClash { name: String },
    #[error("Nested next operator in {section}: {formula}")]
    NestedNext { section: Section, formula: String },
    #[error("Next-state reference to '{name}' is not allowed in {section}")]
    NextNotAllowed { section: Section, name: String },
    #[error("env_init may only reference environment variables, found '{name}'")]
    EnvInitScope { name: String },
    #[error("Empty variable universe: no environment variables, system variables or propositions")]
    EmptyUniverse,
}

/// A GR(1) specification as written: declarations plus parsed formulas.
///
/// Formula strings are parsed when they are added. Names are resolved by
/// [`GrSpec::compile`] once the transition-system propositions are known.
#[derive(Debug, Clone)]
pub struct GrSpec {
    env_vars: IndexSet<String>,
    sys_vars: IndexSet<String>,
    formulas: IndexMap<Section, Vec<FormulaExpr>>,
}

impl GrSpec {
    pub fn new<E, S, N1, N2>(env_vars: E, sys_vars: S) -> Result<Self, SpecError>
    where
        E: IntoIterator<Item = N1>,
        S: IntoIterator<Item = N2>,
        N1: Into<String>,
        N2: Into<String>,
    {
        let env_vars = collect_unique(env_vars)?;
        let sys_vars = collect_unique(sys_vars)?;
        for (player, vars) in [(Player::Env, &env_vars), (Player::Sys, &sys_vars)] {
            if vars.len() > MAX_PLAYER_VARS {
                return Err(SpecError::TooManyVariables {
                    player,
                    count: vars.len(),
                    max: MAX_PLAYER_VARS,
                });
            }
        }
        let overlap: Vec<String> = env_vars.intersection(&sys_vars).cloned().collect();
        if !overlap.is_empty() {
            return Err(SpecError::OverlappingVariables { names: overlap });
        }
        Ok(Self {
            env_vars,
            sys_vars,
            formulas: Section::ALL.iter().map(|&s| (s, Vec::new())).collect(),
        })
    }

    /// Parse `formula` and append it to `section`.
    ///
    /// Init and safety sections are conjunctions of their formulas; justice
    /// sections keep one goal per formula, in insertion order.
    pub fn add(&mut self, section: Section, formula: &str) -> Result<&mut Self, SpecError> {
        let parsed = gr1_dsl::parse_formula_named(formula, &section.to_string())
            .map_err(|source| SpecError::Parse { section, source })?;
        Ok(self.add_formula(section, parsed))
    }

    pub fn add_all<'a, I>(&mut self, section: Section, formulas: I) -> Result<&mut Self, SpecError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for f in formulas {
            self.add(section, f)?;
        }
        Ok(self)
    }

    pub fn add_formula(&mut self, section: Section, formula: FormulaExpr) -> &mut Self {
        self.formulas.entry(section).or_default().push(formula);
        self
    }

    pub fn env_vars(&self) -> &IndexSet<String> {
        &self.env_vars
    }

    pub fn sys_vars(&self) -> &IndexSet<String> {
        &self.sys_vars
    }

    pub fn formulas(&self, section: Section) -> &[FormulaExpr] {
        self.formulas.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve names against the variables and `propositions`, check the
    /// per-section rules and produce evaluable predicates.
    pub fn compile(&self, propositions: &IndexSet<String>) -> Result<CompiledSpec, SpecError> {
        if self.env_vars.is_empty() && self.sys_vars.is_empty() && propositions.is_empty() {
            return Err(SpecError::EmptyUniverse);
        }
        if let Some(name) = self
            .env_vars
            .iter()
            .chain(self.sys_vars.iter())
            .find(|v| propositions.contains(*v))
        {
            return Err(SpecError::NameClash { name: name.clone() });
        }
        let scope = Scope {
            env_vars: &self.env_vars,
            sys_vars: &self.sys_vars,
            propositions,
        };

        let mut lowered: IndexMap<Section, Vec<Expr>> = IndexMap::new();
        for section in Section::ALL {
            let mut exprs = Vec::new();
            for f in self.formulas(section) {
                let e = lower(f, &scope, section)?;
                check_section_rules(&e, section, &scope)?;
                exprs.push(e);
            }
            lowered.insert(section, exprs);
        }
        debug!(
            env_vars = self.env_vars.len(),
            sys_vars = self.sys_vars.len(),
            propositions = propositions.len(),
            env_goals = lowered.get(&Section::EnvProg).map_or(0, Vec::len),
            sys_goals = lowered.get(&Section::SysProg).map_or(0, Vec::len),
            "compiled GR(1) specification"
        );
        let mut take = |s: Section| lowered.swap_remove(&s).unwrap_or_default();

        Ok(CompiledSpec {
            env_init: Expr::conjunction(take(Section::EnvInit)),
            env_safe: Expr::conjunction(take(Section::EnvSafe)),
            env_prog: take(Section::EnvProg),
            sys_init: Expr::conjunction(take(Section::SysInit)),
            sys_safe: Expr::conjunction(take(Section::SysSafe)),
            sys_prog: take(Section::SysProg),
            env_vars: self.env_vars.clone(),
            sys_vars: self.sys_vars.clone(),
            propositions: propositions.clone(),
        })
    }
}

fn collect_unique<I, N>(names: I) -> Result<IndexSet<String>, SpecError>
where
    I: IntoIterator<Item = N>,
    N: Into<String>,
{
    let mut out = IndexSet::new();
    for n in names {
        let n = n.into();
        if !out.insert(n.clone()) {
            return Err(SpecError::DuplicateVariable { name: n });
        }
    }
    Ok(out)
}

fn atom_name(atom: Atom, scope: &Scope<'_>) -> String {
    let name = match atom {
        Atom::Env(i) => scope.env_vars.get_index(i),
        Atom::Sys(i) => scope.sys_vars.get_index(i),
        Atom::Prop(i) => scope.propositions.get_index(i),
    };
    name.cloned().unwrap_or_default()
}

fn check_section_rules(e: &Expr, section: Section, scope: &Scope<'_>) -> Result<(), SpecError> {
    for a in e.atoms() {
        let next = a.tense == Tense::Next;
        match section {
            Section::EnvInit => {
                if next {
                    return Err(SpecError::NextNotAllowed {
                        section,
                        name: atom_name(a.atom, scope),
                    });
                }
                if !matches!(a.atom, Atom::Env(_)) {
                    return Err(SpecError::EnvInitScope {
                        name: atom_name(a.atom, scope),
                    });
                }
            }
            Section::SysInit | Section::EnvProg | Section::SysProg => {
                if next {
                    return Err(SpecError::NextNotAllowed {
                        section,
                        name: atom_name(a.atom, scope),
                    });
                }
            }
            // The environment cannot constrain the system's upcoming move.
            Section::EnvSafe => {
                if next && !matches!(a.atom, Atom::Env(_)) {
                    return Err(SpecError::NextNotAllowed {
                        section,
                        name: atom_name(a.atom, scope),
                    });
                }
            }
            Section::SysSafe => {}
        }
    }
    Ok(())
}

impl fmt::Display for GrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |vars: &IndexSet<String>| {
            if vars.is_empty() {
                "(none)".to_string()
            } else {
                vars.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        };
        writeln!(f, "GR(1) Specification:")?;
        writeln!(f, "  Environment variables: {}", list(&self.env_vars))?;
        writeln!(f, "  System variables: {}", list(&self.sys_vars))?;
        for section in Section::ALL {
            let formulas = self.formulas(section);
            if formulas.is_empty() {
                writeln!(f, "  {section}: (empty)")?;
                continue;
            }
            writeln!(f, "  {section}:")?;
            for (i, formula) in formulas.iter().enumerate() {
                if section.is_justice() {
                    writeln!(f, "    [{i}] []<> {formula}")?;
                } else {
                    writeln!(f, "    {formula}")?;
                }
            }
        }
        Ok(())
    }
}

/// A specification whose predicates are resolved and ready to evaluate.
///
/// All evaluation methods are pure and are called from the game builder and
/// the solver's hot loops.
#[derive(Debug, Clone)]
pub struct CompiledSpec {
    pub env_vars: IndexSet<String>,
    pub sys_vars: IndexSet<String>,
    pub propositions: IndexSet<String>,
    env_init: Expr,
    env_safe: Expr,
    env_prog: Vec<Expr>,
    sys_init: Expr,
    sys_safe: Expr,
    sys_prog: Vec<Expr>,
}

impl CompiledSpec {
    pub fn env_width(&self) -> usize {
        self.env_vars.len()
    }

    pub fn sys_width(&self) -> usize {
        self.sys_vars.len()
    }

    pub fn evaluate_init(&self, player: Player, snapshot: &Snapshot) -> bool {
        match player {
            Player::Env => self.env_init.eval_state(snapshot),
            Player::Sys => self.sys_init.eval_state(snapshot),
        }
    }

    /// Safety over one transition. For the environment, only the `env`
    /// component of `next` is meaningful.
    pub fn evaluate_safety(&self, player: Player, current: &Snapshot, next: &Snapshot) -> bool {
        match player {
            Player::Env => self.env_safe.eval(current, next),
            Player::Sys => self.sys_safe.eval(current, next),
        }
    }

    /// Declared justice predicates of `player`.
    pub fn justice(&self, player: Player) -> &[Expr] {
        match player {
            Player::Env => &self.env_prog,
            Player::Sys => &self.sys_prog,
        }
    }

    /// Number of goals the solver iterates over: an empty justice list counts
    /// as a single goal that always holds.
    pub fn goal_count(&self, player: Player) -> usize {
        self.justice(player).len().max(1)
    }

    /// Evaluate goal `index`. With an empty justice list goal 0 is `true`;
    /// indices past the goal count are `false`.
    pub fn evaluate_justice(&self, player: Player, index: usize, snapshot: &Snapshot) -> bool {
        let goals = self.justice(player);
        if goals.is_empty() {
            return index == 0;
        }
        goals.get(index).is_some_and(|g| g.eval_state(snapshot))
    }
}
