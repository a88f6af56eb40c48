use serde::{Deserialize, Serialize};

pub const DEFAULT_TERMINAL_STAGE: &str = "PROD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    NonTerminal,
    Terminal,
}

/// A named deployment environment; the name keeps the caller's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    name: String,
    role: StageRole,
}

impl Stage {
    pub fn non_terminal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: StageRole::NonTerminal,
        }
    }

    pub fn terminal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: StageRole::Terminal,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    pub fn is_terminal(&self) -> bool {
        self.role == StageRole::Terminal
    }

    /// The name reduced to alphanumerics, casing preserved.
    pub fn logical_key(&self) -> String {
        self.name.chars().filter(|c| c.is_alphanumeric()).collect()
    }
}

/// Non-terminal stages in first-seen order, then exactly one terminal stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan {
    pub non_terminal: Vec<Stage>,
    pub terminal: Stage,
}

impl StagePlan {
    /// Total over any input: mentions of `terminal_name` filter out (exact
    /// match), duplicates collapse, the terminal stage is appended last.
    pub fn normalize<S: AsRef<str>>(names: &[S], terminal_name: &str) -> Self {
        let mut non_terminal: Vec<Stage> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name == terminal_name {
                continue;
            }
            if non_terminal.iter().any(|stage| stage.name() == name) {
                continue;
            }
            non_terminal.push(Stage::non_terminal(name));
        }

        Self {
            non_terminal,
            terminal: Stage::terminal(terminal_name),
        }
    }

    /// All stages in deployment order, terminal last.
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.non_terminal.iter().chain(std::iter::once(&self.terminal))
    }

    /// Never zero; the terminal stage always counts.
    pub fn len(&self) -> usize {
        self.non_terminal.len() + 1
    }
}
