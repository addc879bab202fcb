//! Spreadsheet catalog rows, the ground truth side of a merge.

use serde::{Deserialize, Serialize};

use super::entity::{CatalogRowRef, DamageStatus};
use crate::error::{ReconcileError, Result};

/// A row from a spreadsheet catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    pub category: String,
    #[serde(default)]
    pub damage_status: DamageStatus,
    pub origin_file: String,
    pub row_number: u32,
}

impl CatalogEntity {
    /// Validate and build a catalog row. A blank name is rejected.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        origin_file: impl Into<String>,
        row_number: u32,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let origin_file = origin_file.into();
        if name.is_empty() {
            return Err(ReconcileError::invalid(format!(
                "catalog row {origin_file}#{row_number} has no name"
            )));
        }
        Ok(Self {
            name,
            area: None,
            category: category.into(),
            damage_status: DamageStatus::Unknown,
            origin_file,
            row_number,
        })
    }

    /// Set the area; blank areas are treated as absent.
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        let area = area.into().trim().to_string();
        self.area = (!area.is_empty()).then_some(area);
        self
    }

    pub fn with_damage_status(mut self, status: DamageStatus) -> Self {
        self.damage_status = status;
        self
    }

    /// Re-check the name invariant on deserialized rows.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReconcileError::invalid(format!(
                "catalog row {} has no name",
                self.row_ref()
            )));
        }
        Ok(())
    }

    pub fn row_ref(&self) -> CatalogRowRef {
        CatalogRowRef {
            origin_file: self.origin_file.clone(),
            row_number: self.row_number,
        }
    }
}
