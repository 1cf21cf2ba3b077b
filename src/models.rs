//! Page payloads returned by the GET routes.
//!
//! Each page carries the flash `messages` drained from the session.

use sea_orm::{ActiveEnum, Iterable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::FlashMessage;
use crate::entities::car::{self, CarCondition, TreasureHunt};
use crate::entities::case::{self, CaseCode};
use crate::entities::{collector_profile, series};
use crate::filter::CarFilter;
use crate::queries::{CaseWithCount, CollectionStats, SeriesWithCount};

/// One option of a select field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Options offered by a form's select fields; empty lists are omitted
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FormChoices {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub case: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub treasure_hunt: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub condition: Vec<Choice>,
}

impl FormChoices {
    #[must_use]
    pub fn case_codes() -> Vec<Choice> {
        CaseCode::iter()
            .map(|code| Choice::new(code.as_str(), code.label()))
            .collect()
    }

    #[must_use]
    pub fn treasure_hunts() -> Vec<Choice> {
        TreasureHunt::iter()
            .map(|tier| Choice::new(tier.to_value(), tier.label()))
            .collect()
    }

    #[must_use]
    pub fn conditions() -> Vec<Choice> {
        CarCondition::iter()
            .map(|condition| Choice::new(condition.to_value(), condition.label()))
            .collect()
    }

    #[must_use]
    pub fn cases(cases: &[case::Model]) -> Vec<Choice> {
        cases
            .iter()
            .map(|case| Choice::new(case.id.to_string(), format!("{} Case {}", case.year, case.code)))
            .collect()
    }

    #[must_use]
    pub fn series(series: &[series::Model]) -> Vec<Choice> {
        series
            .iter()
            .map(|series| Choice::new(series.id.to_string(), series.name.clone()))
            .collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomePage {
    pub messages: Vec<FlashMessage>,
    pub cases: Vec<CaseWithCount>,
    /// Active series only
    pub series: Vec<SeriesWithCount>,
    /// Newest non-regular cars, at most twelve
    pub treasure_hunts: Vec<car::Model>,
    pub recent_cars: Vec<car::Model>,
    pub collector: Option<collector_profile::Model>,
    #[serde(flatten)]
    pub stats: CollectionStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardPage {
    pub messages: Vec<FlashMessage>,
    pub user: String,
    pub collector: Option<collector_profile::Model>,
    pub cases: Vec<CaseWithCount>,
    pub series: Vec<SeriesWithCount>,
    pub cars: Vec<car::Model>,
    /// The filters that produced `cars`
    pub filters: CarFilter,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManagePage {
    pub messages: Vec<FlashMessage>,
    pub cases: Vec<CaseWithCount>,
    pub series: Vec<SeriesWithCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CarDetailPage {
    pub messages: Vec<FlashMessage>,
    pub car: car::Model,
    pub case: Option<case::Model>,
    pub series: Option<series::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseDetailPage {
    pub messages: Vec<FlashMessage>,
    pub case: case::Model,
    pub cars: Vec<car::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeriesDetailPage {
    pub messages: Vec<FlashMessage>,
    pub series: series::Model,
    pub cars: Vec<car::Model>,
}

/// Add or edit screen: current values plus the select options
#[derive(Debug, Serialize)]
pub struct FormPage<F> {
    pub messages: Vec<FlashMessage>,
    pub form: F,
    pub choices: FormChoices,
}

/// Delete confirmation screen
#[derive(Debug, Serialize)]
pub struct DeletePage<T> {
    pub messages: Vec<FlashMessage>,
    pub object: T,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginPage {
    pub messages: Vec<FlashMessage>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_choices() {
        let codes = FormChoices::case_codes();
        assert_eq!(codes.len(), 15);
        assert_eq!(codes[0], Choice::new("A", "Case A"));

        let tiers = FormChoices::treasure_hunts();
        assert_eq!(
            tiers.iter().map(|c| c.value.as_str()).collect::<Vec<_>>(),
            vec!["NONE", "TH", "STH", "CHASE"]
        );
        assert_eq!(FormChoices::conditions()[0].label, "Mint in Package");
    }

    #[test]
    fn test_empty_choice_lists_are_omitted() {
        let json = serde_json::to_value(FormChoices {
            code: FormChoices::case_codes(),
            ..Default::default()
        })
        .unwrap();
        assert!(json.get("code").is_some());
        assert!(json.get("series").is_none());
    }
}
