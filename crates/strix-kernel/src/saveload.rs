//! Textual KB state dump
//!
//! The header carries a magic line, the crate version and the native
//! integer width; a mismatch on any of them refuses the load. The body
//! frames integers as `(n)`, then dumps the concept and individual
//! collections (sizes, names, one payload line per entry) and the remaining
//! KB state after the `KB` marker. Loading is only allowed into an empty
//! kernel; saving is refused while axioms are still loading.

use crate::kernel::{KbStatus, ReasoningKernel};
use crate::tbox::{Concept, Individual};
use crate::KernelError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strix_core::{DataValue, Expr, NamedItem};
use strix_roles::{RoleBox, RoleSnapshot};
use tracing::info;

const MAGIC: &str = "StrixInternalStateDump1.0";
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn int_width() -> usize {
    (usize::BITS / 8) as usize
}

#[derive(Serialize, Deserialize)]
struct ConceptPayload {
    definition: Option<Expr>,
    primitive: bool,
}

#[derive(Serialize, Deserialize)]
struct IndividualPayload {
    types: Vec<Expr>,
}

#[derive(Serialize, Deserialize)]
struct KbPayload {
    roles: Vec<RoleSnapshot>,
    disjoint_roles: Vec<(usize, usize)>,
    gcis: Vec<(Expr, Expr)>,
    related: Vec<(usize, usize, usize)>,
    data_assertions: Vec<(usize, usize, DataValue)>,
    different: Vec<(usize, usize)>,
}

/// Streaming reader over the dump text
struct Loader<'a> {
    rest: &'a str,
}

impl<'a> Loader<'a> {
    fn new(text: &'a str) -> Loader<'a> {
        Loader { rest: text }
    }

    fn line(&mut self) -> Result<&'a str, KernelError> {
        match self.rest.find('\n') {
            Some(pos) => {
                let line = &self.rest[..pos];
                self.rest = &self.rest[pos + 1..];
                Ok(line)
            }
            None => Err(KernelError::SaveLoad("unexpected end of dump".to_string())),
        }
    }

    fn expect_char(&mut self, c: char) -> Result<(), KernelError> {
        let mut chars = self.rest.chars();
        match chars.next() {
            Some(found) if found == c => {
                self.rest = chars.as_str();
                Ok(())
            }
            found => Err(KernelError::SaveLoad(format!(
                "expected '{}', found {:?}",
                c, found
            ))),
        }
    }

    /// Framed unsigned integer `(n)`
    fn uint(&mut self) -> Result<usize, KernelError> {
        self.expect_char('(')?;
        let end = self
            .rest
            .find(')')
            .ok_or_else(|| KernelError::SaveLoad("unterminated framed integer".to_string()))?;
        let n = self.rest[..end]
            .parse::<usize>()
            .map_err(|e| KernelError::SaveLoad(format!("bad framed integer: {}", e)))?;
        self.rest = &self.rest[end + 1..];
        Ok(n)
    }

    fn expect_str(&mut self, s: &str) -> Result<(), KernelError> {
        for c in s.chars() {
            self.expect_char(c)?;
        }
        Ok(())
    }

    fn skip_newline(&mut self) -> Result<(), KernelError> {
        self.expect_char('\n')
    }
}

fn json_line<T: Serialize>(value: &T) -> Result<String, KernelError> {
    serde_json::to_string(value).map_err(|e| KernelError::SaveLoad(e.to_string()))
}

fn from_json_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, KernelError> {
    serde_json::from_str(line).map_err(|e| KernelError::SaveLoad(e.to_string()))
}

/// Serialize a name collection: `(size)(maxNameLen)` then the names, then
/// one payload line per entry
fn save_collection<T: NamedItem>(
    out: &mut String,
    items: &[&T],
    payload: impl Fn(&T) -> Result<String, KernelError>,
) -> Result<(), KernelError> {
    let max_len = items.iter().map(|i| i.named().name().len()).max().unwrap_or(0);
    out.push_str(&format!("({})({})", items.len(), max_len));
    for item in items {
        out.push_str(item.named().name());
        out.push('\n');
    }
    for item in items {
        out.push_str(&payload(*item)?);
        out.push('\n');
    }
    Ok(())
}

impl ReasoningKernel {
    /// Dump the KB to its textual state format
    pub fn save_to_string(&self) -> Result<String, KernelError> {
        if self.status == KbStatus::Loading {
            return Err(KernelError::SaveLoad(
                "cannot save a KB that is still loading".to_string(),
            ));
        }
        let mut out = String::new();
        out.push_str(MAGIC);
        out.push('\n');
        out.push_str(VERSION);
        out.push('\n');
        out.push_str(&int_width().to_string());
        out.push('\n');
        out.push_str("Options\n");
        out.push_str(&json_line(&self.options)?);
        out.push('\n');
        out.push_str(&format!("({})", self.status.code()));
        if self.status == KbStatus::Empty {
            return Ok(out);
        }
        out.push('\n');
        out.push('C');
        let concepts: Vec<&Concept> = self.concepts.iter().collect();
        save_collection(&mut out, &concepts, |c: &Concept| {
            json_line(&ConceptPayload {
                definition: c.definition.clone(),
                primitive: c.is_primitive(),
            })
        })?;
        out.push('I');
        let individuals: Vec<&Individual> = self.individuals.iter().collect();
        save_collection(&mut out, &individuals, |i: &Individual| {
            json_line(&IndividualPayload { types: i.types.clone() })
        })?;
        out.push_str("KB\n");
        let (roles, disjoint_roles) = self.roles.snapshot();
        let payload = KbPayload {
            roles,
            disjoint_roles,
            gcis: self.gcis.clone(),
            related: self.related.iter().map(|(a, r, b)| (a.0, r.0, b.0)).collect(),
            data_assertions: self
                .data_assertions
                .iter()
                .map(|(a, r, v)| (a.0, r.0, v.clone()))
                .collect(),
            different: self.different.iter().map(|(a, b)| (a.0, b.0)).collect(),
        };
        out.push_str(&json_line(&payload)?);
        out.push('\n');
        Ok(out)
    }

    /// Load a dump produced by [`save_to_string`](Self::save_to_string)
    ///
    /// Refused for a non-empty kernel and for any header mismatch.
    pub fn load_from_string(&mut self, text: &str) -> Result<(), KernelError> {
        if self.status != KbStatus::Empty {
            return Err(KernelError::SaveLoad(
                "loading requires an empty knowledge base".to_string(),
            ));
        }
        let mut input = Loader::new(text);
        if input.line()? != MAGIC {
            return Err(KernelError::SaveLoad("bad magic line".to_string()));
        }
        let version = input.line()?;
        if version != VERSION {
            return Err(KernelError::SaveLoad(format!(
                "version mismatch: dump has {}, kernel is {}",
                version, VERSION
            )));
        }
        let width = input.line()?;
        if width.parse::<usize>().ok() != Some(int_width()) {
            return Err(KernelError::SaveLoad("integer width mismatch".to_string()));
        }
        if input.line()? != "Options" {
            return Err(KernelError::SaveLoad("missing options block".to_string()));
        }
        self.options = from_json_line(input.line()?)?;
        let status = KbStatus::from_code(input.uint()? as u32)
            .ok_or_else(|| KernelError::SaveLoad("unknown status code".to_string()))?;
        if status == KbStatus::Loading {
            return Err(KernelError::SaveLoad(
                "dump of a loading KB is not loadable".to_string(),
            ));
        }
        if status == KbStatus::Empty {
            return Ok(());
        }
        input.skip_newline()?;

        input.expect_char('C')?;
        let n_concepts = input.uint()?;
        let _max_len = input.uint()?;
        let mut concept_names = Vec::with_capacity(n_concepts);
        for _ in 0..n_concepts {
            concept_names.push(input.line()?.to_string());
        }
        for name in &concept_names {
            self.concepts.get_or_create(name);
        }
        for i in 0..n_concepts {
            let payload: ConceptPayload = from_json_line(input.line()?)?;
            let concept = self.concepts.get_mut(i);
            concept.definition = payload.definition;
            concept.named_mut().primitive = payload.primitive;
        }

        input.expect_char('I')?;
        let n_individuals = input.uint()?;
        let _max_len = input.uint()?;
        let mut individual_names = Vec::with_capacity(n_individuals);
        for _ in 0..n_individuals {
            individual_names.push(input.line()?.to_string());
        }
        for name in &individual_names {
            self.individuals.get_or_create(name);
        }
        for i in 0..n_individuals {
            let payload: IndividualPayload = from_json_line(input.line()?)?;
            self.individuals.get_mut(i).types = payload.types;
        }

        input.expect_str("KB")?;
        input.skip_newline()?;
        let payload: KbPayload = from_json_line(input.line()?)?;
        self.roles = RoleBox::from_snapshot(payload.roles, payload.disjoint_roles);
        self.gcis = payload.gcis;
        self.instance_of = (0..n_individuals)
            .flat_map(|i| {
                let id = strix_core::IndividualId(i);
                self.individuals
                    .get(i)
                    .types
                    .clone()
                    .into_iter()
                    .map(move |t| (id, t))
            })
            .collect();
        self.related = payload
            .related
            .into_iter()
            .map(|(a, r, b)| (strix_core::IndividualId(a), strix_core::RoleId(r), strix_core::IndividualId(b)))
            .collect();
        self.data_assertions = payload
            .data_assertions
            .into_iter()
            .map(|(a, r, v)| (strix_core::IndividualId(a), strix_core::RoleId(r), v))
            .collect();
        self.different = payload
            .different
            .into_iter()
            .map(|(a, b)| (strix_core::IndividualId(a), strix_core::IndividualId(b)))
            .collect();
        // derived state is rebuilt on demand; the recorded status is kept
        self.status = status;
        info!(
            concepts = n_concepts,
            individuals = n_individuals,
            ?status,
            "KB state loaded"
        );
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), KernelError> {
        let text = self.save_to_string()?;
        std::fs::write(path, text).map_err(|e| KernelError::SaveLoad(e.to_string()))
    }

    pub fn load(&mut self, path: &Path) -> Result<(), KernelError> {
        let text = std::fs::read_to_string(path).map_err(|e| KernelError::SaveLoad(e.to_string()))?;
        self.load_from_string(&text)
    }
}
