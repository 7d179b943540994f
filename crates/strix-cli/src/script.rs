//! Script parsing and execution
//!
//! One command per line, `#` starts a comment. Concept expressions use a
//! prefix syntax:
//!
//! ```text
//! concept Person
//! role hasChild
//! implies Parent (and Person (some hasChild Person))
//! instance alice Parent
//! subsumes? Parent Person
//! ```

use strix_core::{DataValue, Datatype, Expr, RoleId};
use strix_kernel::{KernelError, ReasoningKernel};
use tracing::debug;

/// Executes ontology and query scripts against one kernel
pub struct ScriptRunner {
    pub kernel: ReasoningKernel,
    /// one line of output per answered query
    pub output: Vec<String>,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizer over one script line
fn tokenize(line: &str) -> Vec<String> {
    line.replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

struct Tokens {
    items: Vec<String>,
    pos: usize,
}

impl Tokens {
    fn new(items: Vec<String>) -> Tokens {
        Tokens { items, pos: 0 }
    }

    fn next(&mut self) -> Result<String, KernelError> {
        let t = self
            .items
            .get(self.pos)
            .cloned()
            .ok_or_else(|| KernelError::Syntax("unexpected end of line".to_string()))?;
        self.pos += 1;
        Ok(t)
    }

    fn peek(&self) -> Option<&str> {
        self.items.get(self.pos).map(|s| s.as_str())
    }

    fn expect(&mut self, token: &str) -> Result<(), KernelError> {
        let t = self.next()?;
        if t != token {
            return Err(KernelError::Syntax(format!("expected '{}', found '{}'", token, t)));
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.pos >= self.items.len()
    }
}

impl ScriptRunner {
    pub fn new() -> ScriptRunner {
        ScriptRunner { kernel: ReasoningKernel::new(), output: Vec::new() }
    }

    /// Run a whole script; stops at the first error
    pub fn run_script(&mut self, text: &str) -> Result<(), KernelError> {
        for (no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            debug!(line = no + 1, "executing script line");
            self.exec_line(line)
                .map_err(|e| match e {
                    KernelError::Syntax(msg) => {
                        KernelError::Syntax(format!("line {}: {}", no + 1, msg))
                    }
                    other => other,
                })?;
        }
        Ok(())
    }

    fn exec_line(&mut self, line: &str) -> Result<(), KernelError> {
        let mut t = Tokens::new(tokenize(line));
        let command = t.next()?;
        match command.as_str() {
            // declarations
            "concept" => {
                let name = t.next()?;
                self.kernel.concept(&name);
            }
            "individual" => {
                let name = t.next()?;
                self.kernel.individual(&name);
            }
            "role" => {
                let name = t.next()?;
                self.kernel.role(&name);
            }
            "data-role" => {
                let name = t.next()?;
                self.kernel.data_role(&name);
            }
            // concept axioms
            "implies" => {
                let c = self.expr(&mut t)?;
                let d = self.expr(&mut t)?;
                self.kernel.tell_implies(c, d);
            }
            "equivalent" => {
                let c = self.expr(&mut t)?;
                let d = self.expr(&mut t)?;
                self.kernel.tell_equivalent(c, d);
            }
            "disjoint" => {
                let mut exprs = Vec::new();
                while !t.finished() {
                    exprs.push(self.expr(&mut t)?);
                }
                self.kernel.tell_disjoint(&exprs);
            }
            // role axioms
            "subrole" => {
                let r = self.role(&mut t)?;
                let s = self.role(&mut t)?;
                self.kernel.tell_sub_role(r, s);
            }
            "equivroles" => {
                let r = self.role(&mut t)?;
                let s = self.role(&mut t)?;
                self.kernel.tell_equiv_roles(r, s);
            }
            "inverse" => {
                let r = self.role(&mut t)?;
                let s = self.role(&mut t)?;
                self.kernel.tell_inverse_roles(r, s)?;
            }
            "transitive" => {
                let r = self.role(&mut t)?;
                self.kernel.tell_transitive(r)?;
            }
            "reflexive" => {
                let r = self.role(&mut t)?;
                self.kernel.tell_reflexive(r);
            }
            "functional" => {
                let r = self.role(&mut t)?;
                self.kernel.tell_functional(r);
            }
            "disjointroles" => {
                let r = self.role(&mut t)?;
                let s = self.role(&mut t)?;
                self.kernel.tell_disjoint_roles(r, s);
            }
            "chain" => {
                t.expect("(")?;
                let mut chain = Vec::new();
                while t.peek() != Some(")") {
                    chain.push(self.role(&mut t)?);
                }
                t.expect(")")?;
                let s = self.role(&mut t)?;
                self.kernel.tell_role_chain(&chain, s)?;
            }
            "domain" => {
                let r = self.role(&mut t)?;
                let c = self.expr(&mut t)?;
                self.kernel.tell_domain(r, c);
            }
            "range" => {
                let r = self.role(&mut t)?;
                let c = self.expr(&mut t)?;
                self.kernel.tell_range(r, c);
            }
            // assertions
            "instance" => {
                let name = t.next()?;
                let a = self.kernel.individual(&name);
                let c = self.expr(&mut t)?;
                self.kernel.tell_instance_of(a, c);
            }
            "related" => {
                let a = self.individual(&mut t)?;
                let r = self.role(&mut t)?;
                let b = self.individual(&mut t)?;
                self.kernel.tell_related(a, r, b);
            }
            "datavalue" => {
                let a = self.individual(&mut t)?;
                let r = self.role(&mut t)?;
                let v = data_value(&t.next()?);
                self.kernel.tell_data_value(a, r, v);
            }
            "different" => {
                let a = self.individual(&mut t)?;
                let b = self.individual(&mut t)?;
                self.kernel.tell_different(a, b);
            }
            // queries
            "consistent?" => {
                let answer = self.kernel.is_consistent()?;
                self.emit(format!("consistent: {}", answer));
            }
            "satisfiable?" => {
                let c = self.expr(&mut t)?;
                let answer = self.kernel.is_satisfiable(&c)?;
                self.emit(format!("satisfiable: {}", answer));
            }
            "subsumes?" => {
                let c = self.expr(&mut t)?;
                let d = self.expr(&mut t)?;
                let answer = self.kernel.is_subsumed_by(&c, &d)?;
                self.emit(format!("subsumed: {}", answer));
            }
            "equivalent?" => {
                let c = self.expr(&mut t)?;
                let d = self.expr(&mut t)?;
                let answer = self.kernel.is_equivalent(&c, &d)?;
                self.emit(format!("equivalent: {}", answer));
            }
            "related?" => {
                let a = self.individual(&mut t)?;
                let r = self.role(&mut t)?;
                let b = self.individual(&mut t)?;
                let answer = self.kernel.ask_related(a, r, b)?;
                self.emit(format!("related: {}", answer));
            }
            "parents?" => {
                let name = t.next()?;
                let mut names = self.kernel.get_parents(&name)?;
                names.sort();
                self.emit(format!("parents: {}", names.join(" ")));
            }
            "children?" => {
                let name = t.next()?;
                let mut names = self.kernel.get_children(&name)?;
                names.sort();
                self.emit(format!("children: {}", names.join(" ")));
            }
            "equivalents?" => {
                let name = t.next()?;
                let mut names = self.kernel.get_equivalents(&name)?;
                names.sort();
                self.emit(format!("equivalents: {}", names.join(" ")));
            }
            "instances?" => {
                let name = t.next()?;
                let mut names = self.kernel.get_instances(&name)?;
                names.sort();
                self.emit(format!("instances: {}", names.join(" ")));
            }
            "types?" => {
                let name = t.next()?;
                let mut names = self.kernel.get_types(&name, true)?;
                names.sort();
                self.emit(format!("types: {}", names.join(" ")));
            }
            "classify" => self.kernel.classify_kb()?,
            "realise" => self.kernel.realise_kb()?,
            other => {
                return Err(KernelError::Syntax(format!("unknown command '{}'", other)));
            }
        }
        Ok(())
    }

    fn emit(&mut self, line: String) {
        self.output.push(line);
    }

    fn role(&mut self, t: &mut Tokens) -> Result<RoleId, KernelError> {
        let name = t.next()?;
        self.kernel.find_role(&name)
    }

    fn individual(&mut self, t: &mut Tokens) -> Result<strix_core::IndividualId, KernelError> {
        let name = t.next()?;
        Ok(self.kernel.individual(&name))
    }

    /// Parse one prefix expression
    fn expr(&mut self, t: &mut Tokens) -> Result<Expr, KernelError> {
        let token = t.next()?;
        match token.as_str() {
            "(" => {
                let op = t.next()?;
                let e = match op.as_str() {
                    "and" | "or" => {
                        let mut parts = Vec::new();
                        while t.peek() != Some(")") {
                            parts.push(self.expr(t)?);
                        }
                        if op == "and" {
                            Expr::snf_and(parts)
                        } else {
                            Expr::snf_or(parts)
                        }
                    }
                    "not" => Expr::snf_not(self.expr(t)?),
                    "some" => {
                        let r = self.role(t)?;
                        Expr::snf_exists(r, self.expr(t)?)
                    }
                    "all" => {
                        let r = self.role(t)?;
                        Expr::snf_forall(r, self.expr(t)?)
                    }
                    "min" => {
                        let n = parse_u32(&t.next()?)?;
                        let r = self.role(t)?;
                        Expr::snf_ge(n, r, self.expr(t)?)
                    }
                    "max" => {
                        let n = parse_u32(&t.next()?)?;
                        let r = self.role(t)?;
                        Expr::snf_le(n, r, self.expr(t)?)
                    }
                    "oneof" => {
                        let mut parts = Vec::new();
                        while t.peek() != Some(")") {
                            let name = t.next()?;
                            let id = self.kernel.individual(&name);
                            parts.push(Expr::Individual(id));
                        }
                        Expr::snf_or(parts)
                    }
                    "dvalue" => Expr::DataValue(data_value(&t.next()?)),
                    "drange" => {
                        let dt = self.kernel.datatype(&t.next()?)?;
                        let min = parse_bound(&t.next()?, dt)?;
                        let max = parse_bound(&t.next()?, dt)?;
                        self.kernel.data_interval(
                            dt,
                            min.map(|v| (v, false)),
                            max.map(|v| (v, false)),
                        )?
                    }
                    other => {
                        return Err(KernelError::Syntax(format!(
                            "unknown constructor '{}'",
                            other
                        )));
                    }
                };
                t.expect(")")?;
                Ok(e)
            }
            ")" => Err(KernelError::Syntax("unexpected ')'".to_string())),
            "TOP" => Ok(Expr::Top),
            "BOTTOM" => Ok(Expr::Bottom),
            name => Ok(Expr::Concept(self.kernel.concept(name))),
        }
    }
}

fn parse_u32(token: &str) -> Result<u32, KernelError> {
    token
        .parse::<u32>()
        .map_err(|_| KernelError::Syntax(format!("expected a number, found '{}'", token)))
}

/// Literal values: integers and booleans are recognized, everything else is
/// a string
fn data_value(token: &str) -> DataValue {
    if let Ok(n) = token.parse::<i64>() {
        return DataValue::Int(n);
    }
    match token {
        "true" => DataValue::Bool(true),
        "false" => DataValue::Bool(false),
        other => DataValue::Str(other.to_string()),
    }
}

fn parse_bound(token: &str, dt: Datatype) -> Result<Option<DataValue>, KernelError> {
    if token == "*" {
        return Ok(None);
    }
    let v = data_value(token);
    if v.datatype() != dt {
        return Err(KernelError::Syntax(format!(
            "bound '{}' does not belong to datatype {}",
            token, dt
        )));
    }
    Ok(Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> ScriptRunner {
        let mut runner = ScriptRunner::new();
        runner.run_script(text).unwrap();
        runner
    }

    #[test]
    fn test_declarations_and_subsumption() {
        let runner = run(
            "concept Person\n\
             concept Student\n\
             implies Student Person\n\
             subsumes? Student Person\n\
             subsumes? Person Student\n",
        );
        assert_eq!(runner.output, vec!["subsumed: true", "subsumed: false"]);
    }

    #[test]
    fn test_expression_syntax() {
        let runner = run(
            "role hasChild\n\
             concept Person\n\
             implies Parent (and Person (some hasChild Person))\n\
             satisfiable? Parent\n\
             subsumes? Parent Person\n",
        );
        assert_eq!(runner.output, vec!["satisfiable: true", "subsumed: true"]);
    }

    #[test]
    fn test_abox_queries() {
        let runner = run(
            "concept Person\n\
             individual alice\n\
             instance alice Person\n\
             consistent?\n\
             instances? Person\n\
             types? alice\n",
        );
        assert_eq!(
            runner.output,
            vec!["consistent: true", "instances: alice", "types: Person"]
        );
    }

    #[test]
    fn test_datatype_script() {
        let mut runner = ScriptRunner::new();
        runner
            .run_script(
                "data-role age\n\
                 functional age\n\
                 concept Adult\n\
                 implies Adult (some age (drange integer 18 *))\n\
                 individual bob\n\
                 instance bob Adult\n\
                 datavalue bob age 10\n\
                 consistent?\n",
            )
            .unwrap();
        assert_eq!(runner.output, vec!["consistent: false"]);
    }

    #[test]
    fn test_undeclared_role_is_an_error() {
        let mut runner = ScriptRunner::new();
        let err = runner.run_script("implies A (some missing B)\n");
        assert!(matches!(err, Err(KernelError::UndefinedName(_))));
    }

    #[test]
    fn test_syntax_error_names_the_line() {
        let mut runner = ScriptRunner::new();
        let err = runner.run_script("concept A\nfrobnicate B\n");
        match err {
            Err(KernelError::Syntax(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_role_chain_script() {
        let runner = run(
            "role r\n\
             role s\n\
             role t\n\
             chain (r s) t\n\
             individual a\nindividual b\nindividual c\n\
             related a r b\n\
             related b s c\n\
             related? a t c\n",
        );
        assert_eq!(runner.output, vec!["related: true"]);
    }
}
