use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::IngestError;

/// Width of a fully qualified account code.
pub const CODE_WIDTH: usize = 21;

fn non_code_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9A-Z]").expect("static regex"))
}

/// The budgetary dimensions packed into a 21-character account code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountComponents {
    pub gender: String,
    pub group: String,
    pub heading: String,
    pub account: String,
    pub subaccount: String,
    pub dependency: String,
    pub responsible_unit: String,
    pub cost_center: String,
    pub budget_project: String,
    pub source: String,
    pub subsource: String,
    pub resource_type: String,
    pub budget_line_item: String,
}

impl AccountComponents {
    /// Concatenate the components back into the 21-character code.
    pub fn canonical(&self) -> String {
        AccountField::ALL.iter().map(|f| f.get(self)).collect()
    }
}

/// Upper-case the code and drop everything outside `[0-9A-Z]`.
pub fn significant_chars(code: &str) -> String {
    non_code_chars()
        .replace_all(&code.trim().to_uppercase(), "")
        .into_owned()
}

/// Split an account code into its components. Short codes are right-padded
/// with `'0'`; anything past 21 significant characters is ignored.
pub fn decode(code: &str) -> AccountComponents {
    let mut s: Vec<char> = significant_chars(code).chars().take(CODE_WIDTH).collect();
    s.resize(CODE_WIDTH, '0');

    let slice = |offset: usize, width: usize| -> String { s[offset..offset + width].iter().collect() };

    AccountComponents {
        gender: slice(0, 1),
        group: slice(1, 1),
        heading: slice(2, 1),
        account: slice(3, 1),
        subaccount: slice(4, 1),
        dependency: slice(5, 2),
        responsible_unit: slice(7, 2),
        cost_center: slice(9, 2),
        budget_project: slice(11, 2),
        source: slice(13, 1),
        subsource: slice(14, 2),
        resource_type: slice(16, 1),
        budget_line_item: slice(17, 4),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeIssue {
    Empty,
    TooLong(usize),
}

/// Report codes that `decode` would silently pad or truncate.
pub fn validate(code: &str) -> Option<CodeIssue> {
    let len = significant_chars(code).chars().count();
    if len == 0 {
        Some(CodeIssue::Empty)
    } else if len > CODE_WIDTH {
        Some(CodeIssue::TooLong(len))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Component fields, used for filtering and export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Gender,
    Group,
    Heading,
    Account,
    Subaccount,
    Dependency,
    ResponsibleUnit,
    CostCenter,
    BudgetProject,
    Source,
    Subsource,
    ResourceType,
    BudgetLineItem,
}

impl AccountField {
    pub const ALL: [AccountField; 13] = [
        Self::Gender,
        Self::Group,
        Self::Heading,
        Self::Account,
        Self::Subaccount,
        Self::Dependency,
        Self::ResponsibleUnit,
        Self::CostCenter,
        Self::BudgetProject,
        Self::Source,
        Self::Subsource,
        Self::ResourceType,
        Self::BudgetLineItem,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::Group => "group",
            Self::Heading => "heading",
            Self::Account => "account",
            Self::Subaccount => "subaccount",
            Self::Dependency => "dependency",
            Self::ResponsibleUnit => "responsible_unit",
            Self::CostCenter => "cost_center",
            Self::BudgetProject => "budget_project",
            Self::Source => "source",
            Self::Subsource => "subsource",
            Self::ResourceType => "resource_type",
            Self::BudgetLineItem => "budget_line_item",
        }
    }

    /// Column name in the `transactions` table.
    pub fn column(&self) -> &'static str {
        match self {
            // `group` is an SQL keyword
            Self::Group => "group_code",
            other => other.key(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Self::Dependency
            | Self::ResponsibleUnit
            | Self::CostCenter
            | Self::BudgetProject
            | Self::Subsource => 2,
            Self::BudgetLineItem => 4,
            _ => 1,
        }
    }

    pub fn get<'a>(&self, c: &'a AccountComponents) -> &'a str {
        match self {
            Self::Gender => &c.gender,
            Self::Group => &c.group,
            Self::Heading => &c.heading,
            Self::Account => &c.account,
            Self::Subaccount => &c.subaccount,
            Self::Dependency => &c.dependency,
            Self::ResponsibleUnit => &c.responsible_unit,
            Self::CostCenter => &c.cost_center,
            Self::BudgetProject => &c.budget_project,
            Self::Source => &c.source,
            Self::Subsource => &c.subsource,
            Self::ResourceType => &c.resource_type,
            Self::BudgetLineItem => &c.budget_line_item,
        }
    }
}

impl FromStr for AccountField {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        AccountField::ALL
            .iter()
            .find(|f| f.key() == key)
            .copied()
            .ok_or_else(|| IngestError::Other(format!("Unknown account component: {s}")))
    }
}
