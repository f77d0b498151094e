//! In-process `SeedStore`.
//!
//! Batches work on a copy of the tables and publish it on commit, so a
//! rolled-back batch leaves no rows behind. Faults can be injected to
//! exercise the loader's recovery paths.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::catalog::{CriterionDef, TemplateDef};
use crate::error::SeedError;
use crate::ports::{
    CriterionId, Inserted, Result, SeedBatch, SeedStore, StoreCounts, TemplateId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRow {
    pub id: TemplateId,
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionRow {
    pub id: CriterionId,
    pub template_id: TemplateId,
    pub criterion_code: String,
    pub title: String,
    pub weight: Decimal,
    pub critical: bool,
    pub display_order: i32,
}

/// One-shot failures, consumed when they fire. `Unreachable` persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every `begin` and `counts` fails with a connection error.
    Unreachable,
    /// Inserting this criterion fails with a store error.
    FailCriterionInsert { criterion_code: String },
    /// Another writer inserts this criterion first; the insert reports a duplicate key.
    DuplicateOnCriterionInsert { criterion_code: String },
    /// Another writer inserts this template first; the insert reports a conflict.
    ConflictOnTemplateInsert { code: String },
}

#[derive(Debug, Clone, Default)]
struct Tables {
    templates: Vec<TemplateRow>,
    criteria: Vec<CriterionRow>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn add_template(&mut self, code: &str, name: &str, description: &str) -> TemplateId {
        let id = TemplateId(self.next_id());
        self.templates.push(TemplateRow {
            id,
            code: code.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        });
        id
    }

    fn add_criterion(
        &mut self,
        template_id: TemplateId,
        code: &str,
        title: &str,
        weight: Decimal,
        critical: bool,
        display_order: i32,
    ) -> CriterionId {
        let id = CriterionId(self.next_id());
        self.criteria.push(CriterionRow {
            id,
            template_id,
            criterion_code: code.to_string(),
            title: title.to_string(),
            weight,
            critical,
            display_order,
        });
        id
    }

    fn template_by_code(&self, code: &str) -> Option<TemplateId> {
        self.templates.iter().find(|t| t.code == code).map(|t| t.id)
    }

    fn template_by_name(&self, name: &str) -> Option<TemplateId> {
        self.templates.iter().find(|t| t.name == name).map(|t| t.id)
    }

    fn criterion_by_key(&self, template_id: TemplateId, code: &str) -> Option<CriterionId> {
        self.criteria
            .iter()
            .find(|c| c.template_id == template_id && c.criterion_code == code)
            .map(|c| c.id)
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    faults: Vec<Fault>,
    batches_opened: usize,
    closed: bool,
}

impl State {
    fn unreachable(&self) -> bool {
        self.faults.contains(&Fault::Unreachable)
    }

    fn take(&mut self, fault: &Fault) -> bool {
        match self.faults.iter().position(|f| f == fault) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySeedStore {
    state: Arc<Mutex<State>>,
}

impl MemorySeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inject(&self, fault: Fault) {
        self.state.lock().await.faults.push(fault);
    }

    pub async fn templates(&self) -> Vec<TemplateRow> {
        self.state.lock().await.tables.templates.clone()
    }

    pub async fn criteria(&self) -> Vec<CriterionRow> {
        self.state.lock().await.tables.criteria.clone()
    }

    /// Committed row totals, ignoring injected faults.
    pub async fn counts_now(&self) -> StoreCounts {
        let state = self.state.lock().await;
        StoreCounts {
            templates: state.tables.templates.len() as i64,
            criteria: state.tables.criteria.len() as i64,
        }
    }

    pub async fn batches_opened(&self) -> usize {
        self.state.lock().await.batches_opened
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Insert a committed template row directly, bypassing the loader.
    pub async fn insert_template_row(&self, code: &str, name: &str) -> TemplateId {
        self.state.lock().await.tables.add_template(code, name, "")
    }

    /// Insert a committed criterion row directly, bypassing the loader.
    pub async fn insert_criterion_row(
        &self,
        template_id: TemplateId,
        code: &str,
        title: &str,
    ) -> CriterionId {
        let mut state = self.state.lock().await;
        let order = state
            .tables
            .criteria
            .iter()
            .filter(|c| c.template_id == template_id)
            .count() as i32
            + 1;
        state
            .tables
            .add_criterion(template_id, code, title, Decimal::ZERO, false, order)
    }
}

#[async_trait]
impl SeedStore for MemorySeedStore {
    async fn begin(&self) -> Result<Box<dyn SeedBatch>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SeedError::Connection(anyhow!("store is closed")));
        }
        if state.unreachable() {
            return Err(SeedError::Connection(anyhow!("store is unreachable")));
        }
        state.batches_opened += 1;
        Ok(Box::new(MemoryBatch {
            state: Arc::clone(&self.state),
            working: state.tables.clone(),
        }))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        if self.state.lock().await.unreachable() {
            return Err(SeedError::Connection(anyhow!("store is unreachable")));
        }
        Ok(self.counts_now().await)
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
    }
}

struct MemoryBatch {
    state: Arc<Mutex<State>>,
    working: Tables,
}

#[async_trait]
impl SeedBatch for MemoryBatch {
    async fn find_template(&mut self, code: &str) -> Result<Option<TemplateId>> {
        Ok(self.working.template_by_code(code))
    }

    async fn find_template_by_name(&mut self, name: &str) -> Result<Option<TemplateId>> {
        Ok(self.working.template_by_name(name))
    }

    async fn insert_template(&mut self, template: &TemplateDef) -> Result<Inserted<TemplateId>> {
        let conflict = Fault::ConflictOnTemplateInsert {
            code: template.code.clone(),
        };
        if self.state.lock().await.take(&conflict) {
            self.working
                .add_template(&template.code, &template.name, &template.description);
            return Ok(Inserted::AlreadyExists);
        }

        // Both code and name are unique, as in the relational schema.
        if self.working.template_by_code(&template.code).is_some()
            || self.working.template_by_name(&template.name).is_some()
        {
            return Ok(Inserted::AlreadyExists);
        }
        let id = self
            .working
            .add_template(&template.code, &template.name, &template.description);
        Ok(Inserted::Created(id))
    }

    async fn find_criterion(
        &mut self,
        template_id: TemplateId,
        criterion_code: &str,
    ) -> Result<Option<CriterionId>> {
        Ok(self.working.criterion_by_key(template_id, criterion_code))
    }

    async fn insert_criterion(
        &mut self,
        template_id: TemplateId,
        criterion: &CriterionDef,
        display_order: i32,
    ) -> Result<Inserted<CriterionId>> {
        let failure = Fault::FailCriterionInsert {
            criterion_code: criterion.code.clone(),
        };
        let duplicate = Fault::DuplicateOnCriterionInsert {
            criterion_code: criterion.code.clone(),
        };
        {
            let mut state = self.state.lock().await;
            if state.take(&failure) {
                return Err(SeedError::store(
                    "insert criterion",
                    anyhow!("injected failure"),
                ));
            }
            if state.take(&duplicate) {
                drop(state);
                self.working.add_criterion(
                    template_id,
                    &criterion.code,
                    &criterion.title,
                    criterion.weight,
                    criterion.critical,
                    display_order,
                );
                return Err(SeedError::DuplicateKey(format!(
                    "assessment_criteria ({template_id}, {})",
                    criterion.code
                )));
            }
        }

        if !self
            .working
            .templates
            .iter()
            .any(|t| t.id == template_id)
        {
            return Err(SeedError::store(
                "insert criterion",
                anyhow!("template {template_id} does not exist"),
            ));
        }
        if self
            .working
            .criterion_by_key(template_id, &criterion.code)
            .is_some()
        {
            return Ok(Inserted::AlreadyExists);
        }
        let id = self.working.add_criterion(
            template_id,
            &criterion.code,
            &criterion.title,
            criterion.weight,
            criterion.critical,
            display_order,
        );
        Ok(Inserted::Created(id))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryBatch { state, working } = *self;
        state.lock().await.tables = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
