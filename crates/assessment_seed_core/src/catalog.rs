//! Versioned catalog of assessment templates and their criteria.
//!
//! The bundled catalog lives in `catalog/assessment_criteria.yaml` and is
//! compiled into the binary. Alternative catalogs can be loaded from disk
//! with the same schema.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogViolation, SeedError};

const BUNDLED_CATALOG: &str = include_str!("../catalog/assessment_criteria.yaml");

/// Weights are stored as `NUMERIC(5, 2)`.
const MAX_WEIGHT: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);
const WEIGHT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub version: u32,
    pub templates: Vec<TemplateDef>,
}

/// A template and the ordered criteria it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDef {
    /// Natural key, e.g. `gate_0`.
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Number of criteria the template is meant to carry once complete.
    #[serde(default)]
    pub expected_criteria: Option<usize>,
    #[serde(default)]
    pub criteria: Vec<CriterionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionDef {
    /// Natural key within the owning template, e.g. `G0-SC-1`.
    pub code: String,
    #[serde(default)]
    pub dimension: String,
    #[serde(default)]
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assessment_question: String,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub critical: bool,
}

/// Non-fatal catalog findings, reported before seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWarning {
    IncompleteTemplate {
        code: String,
        declared: usize,
        expected: usize,
    },
    WeightTotal {
        code: String,
        total: Decimal,
    },
}

impl std::fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompleteTemplate {
                code,
                declared,
                expected,
            } => write!(
                f,
                "{code}: only {declared} of {expected} criteria declared ({} missing)",
                expected - declared
            ),
            Self::WeightTotal { code, total } => {
                write!(f, "{code}: criterion weights sum to {total}, expected 100")
            }
        }
    }
}

impl Catalog {
    /// The catalog compiled into this crate.
    pub fn bundled() -> Result<Self, SeedError> {
        Self::from_yaml_str(BUNDLED_CATALOG)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SeedError> {
        serde_yaml::from_str(yaml).map_err(|e| {
            SeedError::InvalidCatalog(vec![CatalogViolation::catalog(format!(
                "failed to parse catalog: {e}"
            ))])
        })
    }

    /// Load a catalog file. An unreadable file is a configuration error;
    /// unparseable content is an invalid catalog.
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            SeedError::Configuration(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn template(&self, code: &str) -> Option<&TemplateDef> {
        self.templates.iter().find(|t| t.code == code)
    }

    pub fn criteria_count(&self) -> usize {
        self.templates.iter().map(|t| t.criteria.len()).sum()
    }

    /// Check the structural rules the loader relies on.
    pub fn validate(&self) -> Result<(), SeedError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SeedError::InvalidCatalog(violations))
        }
    }

    pub fn violations(&self) -> Vec<CatalogViolation> {
        let mut out = Vec::new();

        if self.templates.is_empty() {
            out.push(CatalogViolation::catalog("catalog declares no templates"));
        }

        let mut codes = HashSet::new();
        let mut names = HashSet::new();
        for template in &self.templates {
            let code = template.code.trim();
            if code.is_empty() {
                out.push(CatalogViolation::template(
                    &template.name,
                    "template code is empty",
                ));
            } else if !codes.insert(code) {
                out.push(CatalogViolation::template(code, "duplicate template code"));
            }
            if !code.is_empty() && code != template.code {
                out.push(CatalogViolation::template(
                    code,
                    "template code has surrounding whitespace",
                ));
            }

            let name = template.name.trim();
            if name.is_empty() {
                out.push(CatalogViolation::template(code, "template name is empty"));
            } else if !names.insert(name) {
                out.push(CatalogViolation::template(
                    code,
                    format!("duplicate template name '{name}'"),
                ));
            }

            let mut criterion_codes = HashSet::new();
            for criterion in &template.criteria {
                let c = criterion.code.trim();
                if c.is_empty() {
                    out.push(CatalogViolation::criterion(
                        code,
                        &criterion.title,
                        "criterion code is empty",
                    ));
                } else if !criterion_codes.insert(c) {
                    out.push(CatalogViolation::criterion(
                        code,
                        c,
                        "duplicate criterion code",
                    ));
                }
                if !c.is_empty() && c != criterion.code {
                    out.push(CatalogViolation::criterion(
                        code,
                        c,
                        "criterion code has surrounding whitespace",
                    ));
                }
                if criterion.title.trim().is_empty() {
                    out.push(CatalogViolation::criterion(code, c, "criterion title is empty"));
                }
                if criterion.weight.is_sign_negative() && !criterion.weight.is_zero() {
                    out.push(CatalogViolation::criterion(
                        code,
                        c,
                        format!("negative weight {}", criterion.weight),
                    ));
                }
                if criterion.weight > MAX_WEIGHT
                    || criterion.weight.normalize().scale() > WEIGHT_SCALE
                {
                    out.push(CatalogViolation::criterion(
                        code,
                        c,
                        format!("weight {} does not fit NUMERIC(5, 2)", criterion.weight),
                    ));
                }
            }
        }

        out
    }

    pub fn warnings(&self) -> Vec<CatalogWarning> {
        let mut out = Vec::new();
        for template in &self.templates {
            let declared = template.criteria.len();
            if let Some(expected) = template.expected_criteria {
                if declared < expected {
                    out.push(CatalogWarning::IncompleteTemplate {
                        code: template.code.clone(),
                        declared,
                        expected,
                    });
                }
            }
            if declared > 0 {
                let total = template.total_weight();
                if total != Decimal::ONE_HUNDRED {
                    out.push(CatalogWarning::WeightTotal {
                        code: template.code.clone(),
                        total,
                    });
                }
            }
        }
        out
    }
}

impl TemplateDef {
    pub fn total_weight(&self) -> Decimal {
        self.criteria.iter().map(|c| c.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::*;

    fn two_criteria_yaml() -> &'static str {
        r#"
version: 1
templates:
  - code: template_a
    name: Template A
    criteria:
      - code: CLARITY
        title: Clarity
        weight: "60.00"
      - code: EVIDENCE
        title: Evidence
        weight: "40.00"
"#
    }

    #[test]
    fn bundled_catalog_parses_and_validates() {
        let catalog = Catalog::bundled().unwrap();
        catalog.validate().unwrap();

        let codes: Vec<&str> = catalog.templates.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["gate_0", "gate_1", "par", "gate_3"]);
        assert_eq!(catalog.template("gate_0").unwrap().criteria.len(), 15);
        assert_eq!(catalog.template("gate_1").unwrap().criteria.len(), 30);
        assert_eq!(catalog.template("par").unwrap().criteria.len(), 2);
        assert_eq!(catalog.template("gate_3").unwrap().criteria.len(), 25);
        assert_eq!(catalog.criteria_count(), 72);
    }

    #[test]
    fn bundled_catalog_preserves_criterion_fields() {
        let catalog = Catalog::bundled().unwrap();
        let first = &catalog.template("gate_0").unwrap().criteria[0];
        assert_eq!(first.code, "G0-SC-1");
        assert_eq!(first.category, "Strategic Case");
        assert_eq!(first.title, "Strategic Alignment");
        assert_eq!(first.weight, Decimal::new(1000, 2));
        assert!(first.critical);
    }

    #[test]
    fn bundled_catalog_warnings() {
        let catalog = Catalog::bundled().unwrap();
        let warnings = catalog.warnings();

        assert!(warnings.contains(&CatalogWarning::IncompleteTemplate {
            code: "par".into(),
            declared: 2,
            expected: 50,
        }));
        // Gate 0 is the only template whose weights add up to 100.
        assert!(!warnings
            .iter()
            .any(|w| matches!(w, CatalogWarning::WeightTotal { code, .. } if code == "gate_0")));
        assert!(warnings.contains(&CatalogWarning::WeightTotal {
            code: "gate_1".into(),
            total: Decimal::new(108, 0),
        }));
        assert!(warnings.contains(&CatalogWarning::WeightTotal {
            code: "par".into(),
            total: Decimal::new(55, 1),
        }));
    }

    #[test]
    fn parses_minimal_catalog_with_defaults() {
        let catalog = Catalog::from_yaml_str(two_criteria_yaml()).unwrap();
        let template = &catalog.templates[0];
        assert_eq!(template.description, "");
        assert_eq!(template.expected_criteria, None);
        assert_eq!(template.criteria[1].title, "Evidence");
        assert!(!template.criteria[1].critical);
        assert!(catalog.validate().is_ok());
        assert!(catalog.warnings().is_empty());
    }

    #[test]
    fn unknown_field_is_invalid_catalog() {
        let err = Catalog::from_yaml_str("version: 1\ntemplates: []\nextra: true\n").unwrap_err();
        assert!(matches!(err, SeedError::InvalidCatalog(ref v) if v.len() == 1));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rejects_empty_catalog() {
        let catalog = Catalog {
            version: 1,
            templates: vec![],
        };
        let violations = catalog.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "catalog declares no templates");
    }

    #[test]
    fn rejects_duplicate_keys_and_blank_fields() {
        let yaml = r#"
version: 1
templates:
  - code: a
    name: Same
    criteria:
      - code: C1
        title: First
      - code: C1
        title: "  "
  - code: a
    name: Same
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let messages: Vec<String> = catalog.violations().iter().map(|v| v.to_string()).collect();

        assert!(messages.contains(&"[a/C1] duplicate criterion code".to_string()));
        assert!(messages.contains(&"[a/C1] criterion title is empty".to_string()));
        assert!(messages.contains(&"[a] duplicate template code".to_string()));
        assert!(messages.contains(&"[a] duplicate template name 'Same'".to_string()));
        assert!(matches!(
            catalog.validate(),
            Err(SeedError::InvalidCatalog(v)) if v.len() == 4
        ));
    }

    #[test]
    fn rejects_negative_weight() {
        let yaml = r#"
version: 1
templates:
  - code: a
    name: A
    criteria:
      - code: C1
        title: First
        weight: "-1.50"
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let violations = catalog.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "negative weight -1.50");
    }

    #[test]
    fn rejects_weights_outside_column_precision() {
        let yaml = r#"
version: 1
templates:
  - code: a
    name: A
    criteria:
      - code: C1
        title: Too large
        weight: "1000.00"
      - code: C2
        title: Too precise
        weight: "1.234"
      - code: C3
        title: Largest
        weight: "999.99"
      - code: C4
        title: Trailing zeros
        weight: "12.5000"
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let messages: Vec<String> = catalog.violations().iter().map(|v| v.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "[a/C1] weight 1000.00 does not fit NUMERIC(5, 2)",
                "[a/C2] weight 1.234 does not fit NUMERIC(5, 2)",
            ]
        );
    }

    #[test]
    fn rejects_padded_codes() {
        let yaml = r#"
version: 1
templates:
  - code: "a "
    name: A
    criteria:
      - code: " C1"
        title: First
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let messages: Vec<String> = catalog.violations().iter().map(|v| v.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "[a] template code has surrounding whitespace",
                "[a/C1] criterion code has surrounding whitespace",
            ]
        );
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(two_criteria_yaml().as_bytes()).unwrap();

        let catalog = Catalog::from_path(file.path()).unwrap();
        assert_eq!(catalog.criteria_count(), 2);
    }

    #[test]
    fn from_path_missing_file_is_configuration_error() {
        let err = Catalog::from_path(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
        assert!(matches!(err, SeedError::Configuration(_)));
    }

    #[test]
    fn warning_display() {
        let w = CatalogWarning::IncompleteTemplate {
            code: "par".into(),
            declared: 2,
            expected: 50,
        };
        assert_eq!(w.to_string(), "par: only 2 of 50 criteria declared (48 missing)");

        let w = CatalogWarning::WeightTotal {
            code: "gate_3".into(),
            total: Decimal::new(9900, 2),
        };
        assert_eq!(w.to_string(), "gate_3: criterion weights sum to 99.00, expected 100");
    }
}
