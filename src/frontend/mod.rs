//! The command language on top of the engine.
//!
//! [`Frontend::execute`] parses one command line and runs it. Attribute-list
//! selects with a condition and attribute-list joins are evaluated in two
//! steps through the temporary relation [`TEMP_REL`].

mod parser;

pub use parser::{Command, Predicate, parse};

use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::access::{InsertOutcome, Scan};
use crate::algebra;
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::AttrType;
use crate::schema;

/// Relation holding intermediate results
pub const TEMP_REL: &str = ".temp";

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("{0}")]
    Db(#[from] DbError),

    #[error("Syntax error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Relation {0} is not part of the join")]
    UnknownQualifier(String),
}

pub type FrontendResult<T> = Result<T, FrontendError>;

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Done,
    Message(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Exit,
}

pub struct Frontend {
    engine: Engine,
}

impl Frontend {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Close every relation and flush the disk
    pub fn shutdown(self) -> DbResult<()> {
        self.engine.shutdown()
    }

    /// Parse and run one command line
    pub fn execute(&mut self, line: &str) -> FrontendResult<Output> {
        let command = parse(line).map_err(FrontendError::Parse)?;
        self.run(command)
    }

    pub fn run(&mut self, command: Command) -> FrontendResult<Output> {
        match command {
            Command::CreateTable { name, attrs } => self.create_table(&name, &attrs)?,
            Command::DropTable(name) => self.drop_table(&name)?,
            Command::OpenTable(name) => {
                let rel_id = self.open_table(&name)?;
                return Ok(Output::Message(format!(
                    "Relation {} opened with id {}",
                    name, rel_id
                )));
            }
            Command::CloseTable(name) => self.close_table(&name)?,
            Command::RenameTable { old, new } => self.rename_table(&old, &new)?,
            Command::RenameColumn { rel, old, new } => self.rename_column(&rel, &old, &new)?,
            Command::CreateIndex { rel, attr } => self.create_index(&rel, &attr)?,
            Command::DropIndex { rel, attr } => self.drop_index(&rel, &attr)?,
            Command::Insert { rel, values } => {
                if let InsertOutcome::IndexBlocksReleased(_) = self.insert(&rel, &values)? {
                    return Ok(Output::Message(
                        "Disk full: some indexes were dropped".to_string(),
                    ));
                }
            }
            Command::InsertFromFile { rel, path } => {
                let count = self.insert_from_csv(&rel, &path)?;
                return Ok(Output::Message(format!(
                    "Inserted {} records into {}",
                    count, rel
                )));
            }
            Command::Select {
                attrs,
                src,
                target,
                condition,
            } => self.select(attrs.as_deref(), &src, &target, condition.as_ref())?,
            Command::Join {
                attrs,
                src1,
                src2,
                target,
                left,
                right,
            } => self.join(attrs.as_deref(), &src1, &src2, &target, &left, &right)?,
            Command::PrintTable(name) => return self.print_table(&name),
            Command::Exit => return Ok(Output::Exit),
        }
        Ok(Output::Done)
    }

    pub fn create_table(&mut self, name: &str, attrs: &[(String, AttrType)]) -> DbResult<()> {
        schema::create_rel(&mut self.engine, name, attrs)
    }

    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        schema::delete_rel(&mut self.engine, name)
    }

    pub fn open_table(&mut self, name: &str) -> DbResult<RelId> {
        schema::open_rel(&mut self.engine, name)
    }

    pub fn close_table(&mut self, name: &str) -> DbResult<()> {
        schema::close_rel(&mut self.engine, name)
    }

    pub fn rename_table(&mut self, old: &str, new: &str) -> DbResult<()> {
        schema::rename_rel(&mut self.engine, old, new)
    }

    pub fn rename_column(&mut self, rel: &str, old: &str, new: &str) -> DbResult<()> {
        schema::rename_attr(&mut self.engine, rel, old, new)
    }

    pub fn create_index(&mut self, rel: &str, attr: &str) -> DbResult<()> {
        schema::create_index(&mut self.engine, rel, attr)
    }

    pub fn drop_index(&mut self, rel: &str, attr: &str) -> DbResult<()> {
        schema::drop_index(&mut self.engine, rel, attr)
    }

    pub fn insert<S: AsRef<str>>(&mut self, rel: &str, values: &[S]) -> DbResult<InsertOutcome> {
        algebra::insert(&mut self.engine, rel, values)
    }

    /// Insert every row of a headerless CSV file, stopping at the first bad row
    ///
    /// Rows inserted before the failure stay in the relation.
    pub fn insert_from_csv<P: AsRef<Path>>(&mut self, rel: &str, path: P) -> FrontendResult<usize> {
        self.engine.cache().rel_id(rel)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let mut count = 0;
        for row in reader.records() {
            let row = row?;
            let values: Vec<&str> = row.iter().collect();
            algebra::insert(&mut self.engine, rel, &values)?;
            count += 1;
        }

        info!(
            "inserted {} records into {} from {}",
            count,
            rel,
            path.as_ref().display()
        );
        Ok(count)
    }

    pub fn select(
        &mut self,
        attrs: Option<&[String]>,
        src: &str,
        target: &str,
        condition: Option<&Predicate>,
    ) -> DbResult<()> {
        match (attrs, condition) {
            (None, None) => algebra::project(&mut self.engine, src, target),
            (None, Some(cond)) => {
                algebra::select(&mut self.engine, src, target, &cond.attr, cond.op, &cond.value)
            }
            (Some(attrs), None) => algebra::project_attrs(&mut self.engine, src, target, attrs),
            (Some(attrs), Some(cond)) => self.through_temp(target, attrs, |engine| {
                algebra::select(engine, src, TEMP_REL, &cond.attr, cond.op, &cond.value)
            }),
        }
    }

    /// Join on `left = right`, where each side is `(relation, attribute)`
    ///
    /// The qualifiers may name the relations in either order.
    pub fn join(
        &mut self,
        attrs: Option<&[String]>,
        src1: &str,
        src2: &str,
        target: &str,
        left: &(String, String),
        right: &(String, String),
    ) -> FrontendResult<()> {
        let (attr1, attr2) = if left.0 == src1 && right.0 == src2 {
            (&left.1, &right.1)
        } else if left.0 == src2 && right.0 == src1 {
            (&right.1, &left.1)
        } else if left.0 != src1 && left.0 != src2 {
            return Err(FrontendError::UnknownQualifier(left.0.clone()));
        } else {
            return Err(FrontendError::UnknownQualifier(right.0.clone()));
        };

        match attrs {
            None => algebra::join(&mut self.engine, src1, src2, target, attr1, attr2)?,
            Some(attrs) => self.through_temp(target, attrs, |engine| {
                algebra::join(engine, src1, src2, TEMP_REL, attr1, attr2)
            })?,
        }
        Ok(())
    }

    /// Fill the temporary relation, project `attrs` of it into `target`, then drop it
    fn through_temp<F>(&mut self, target: &str, attrs: &[String], fill: F) -> DbResult<()>
    where
        F: FnOnce(&mut Engine) -> DbResult<()>,
    {
        // Left behind by an interrupted session
        match schema::delete_rel(&mut self.engine, TEMP_REL) {
            Ok(()) => warn!("removed stale {}", TEMP_REL),
            Err(DbError::RelNotExist(_)) => {}
            Err(err) => return Err(err),
        }
        fill(&mut self.engine)?;

        let result = schema::open_rel(&mut self.engine, TEMP_REL)
            .and_then(|_| algebra::project_attrs(&mut self.engine, TEMP_REL, target, attrs));

        if self.engine.cache().is_open(TEMP_REL)
            && let Err(err) = schema::close_rel(&mut self.engine, TEMP_REL)
        {
            warn!("could not close {}: {}", TEMP_REL, err);
        }
        if let Err(err) = schema::delete_rel(&mut self.engine, TEMP_REL) {
            warn!("could not delete {}: {}", TEMP_REL, err);
        }
        result
    }

    /// Every record of a relation as text, opening it for the duration if needed
    pub fn print_table(&mut self, name: &str) -> FrontendResult<Output> {
        let opened_here = !self.engine.cache().is_open(name);
        let rel_id = schema::open_rel(&mut self.engine, name)?;

        let result = self.table_contents(rel_id);
        if opened_here {
            schema::close_rel(&mut self.engine, name)?;
        }
        let (columns, rows) = result?;
        Ok(Output::Table { columns, rows })
    }

    fn table_contents(&mut self, rel_id: RelId) -> DbResult<(Vec<String>, Vec<Vec<String>>)> {
        let columns = self
            .engine
            .cache()
            .attr_entries(rel_id)?
            .into_iter()
            .map(|attr| attr.attr_name)
            .collect();

        let rows = Scan::new(rel_id)
            .iter(&mut self.engine)
            .map(|item| {
                item.map(|(_, record)| record.values().iter().map(ToString::to_string).collect::<Vec<_>>())
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok((columns, rows))
    }
}
