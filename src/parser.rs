//! Tokenizer and parser for the command language. Commands are
//! newline-delimited; one call to `parse` handles one line and yields a
//! `Command` value (or `None` for a blank/comment line).

use crate::ast::{
    AggregateExpr, AggregateFunction, BinaryOperator, Command, Condition, Operand, SortKey,
    SortOrder,
};
use crate::error::{EngineError, Result};

/// Split a command line into tokens. Whitespace separates tokens; commas
/// and parentheses are delimiters that become tokens of their own; a
/// token starting with `--` comments out the rest of the line.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for ch in line.chars() {
        match ch {
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            ',' | '(' | ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            _ => current.push(ch),
        }
        if current == "--" {
            current.clear();
            return tokens;
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

/// Parse one command line. Blank lines and comments yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let command = parser.command()?;
    parser.finish()?;
    Ok(Some(command))
}

struct Parser {
    tokens: Vec<String>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn peek_at(&self, offset: usize) -> Option<&str> {
        self.tokens.get(self.pos + offset).map(String::as_str)
    }

    fn advance(&mut self) -> Result<&str> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| EngineError::Syntax("unexpected end of command".into()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &str) -> Result<()> {
        let token = self.advance()?;
        if token == expected {
            Ok(())
        } else {
            Err(EngineError::Syntax(format!("expected '{expected}', got '{token}'")))
        }
    }

    fn name(&mut self, what: &str) -> Result<String> {
        let token = self.advance()?;
        if matches!(token, "," | "(" | ")") {
            return Err(EngineError::Syntax(format!("expected {what}, got '{token}'")));
        }
        Ok(token.to_string())
    }

    fn integer(&mut self) -> Result<i32> {
        let token = self.advance()?;
        token
            .parse::<i32>()
            .map_err(|_| EngineError::Syntax(format!("'{token}' is not a 32-bit integer literal")))
    }

    fn operator(&mut self) -> Result<BinaryOperator> {
        let token = self.advance()?;
        BinaryOperator::parse(token)
            .ok_or_else(|| EngineError::Syntax(format!("unknown comparison operator '{token}'")))
    }

    fn skip_commas(&mut self) {
        while self.peek() == Some(",") {
            self.pos += 1;
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(extra) => Err(EngineError::Syntax(format!("unexpected trailing token '{extra}'"))),
        }
    }

    fn command(&mut self) -> Result<Command> {
        if self.peek_at(1) == Some("<-") {
            return self.assignment();
        }
        let keyword = self.advance()?.to_string();
        match keyword.as_str() {
            "LOAD" => Ok(Command::Load { table: self.name("a relation name")? }),
            "PRINT" => Ok(Command::Print { table: self.name("a relation name")? }),
            "EXPORT" => Ok(Command::Export { table: self.name("a relation name")? }),
            "CLEAR" => Ok(Command::Clear { table: self.name("a relation name")? }),
            "LIST" => {
                self.expect("TABLES")?;
                Ok(Command::ListTables)
            }
            "SOURCE" => Ok(Command::Source { file: self.name("a file name")? }),
            "RENAME" => self.rename(),
            "SORT" => self.sort(),
            "INSERT" => self.insert(),
            "UPDATE" => self.update(),
            "DELETE" => self.delete(),
            "QUIT" => Ok(Command::Quit),
            _ => Err(EngineError::Syntax(format!("unrecognized command '{keyword}'"))),
        }
    }

    /// `R <- <operator> ...`
    fn assignment(&mut self) -> Result<Command> {
        let result = self.name("a result relation name")?;
        self.expect("<-")?;
        let operator = self.advance()?.to_string();
        match operator.as_str() {
            "PROJECT" => self.project(result),
            "SELECT" => self.select(result),
            "SEARCH" => self.search(result),
            "JOIN" => self.join(result),
            "CROSS" => self.cross(result),
            "DISTINCT" => Ok(Command::Distinct {
                result,
                source: self.name("a relation name")?,
            }),
            "ORDER" => self.order_by(result),
            "GROUP" => self.group_by(result),
            _ => Err(EngineError::Syntax(format!("unrecognized operator '{operator}'"))),
        }
    }

    /// `RENAME old TO new FROM T`
    fn rename(&mut self) -> Result<Command> {
        let from = self.name("a column name")?;
        self.expect("TO")?;
        let to = self.name("a column name")?;
        self.expect("FROM")?;
        let table = self.name("a relation name")?;
        Ok(Command::Rename { table, from, to })
    }

    /// `R <- PROJECT c1, ..., ck FROM T`
    fn project(&mut self, result: String) -> Result<Command> {
        let mut columns = Vec::new();
        loop {
            self.skip_commas();
            if self.peek() == Some("FROM") {
                break;
            }
            columns.push(self.name("a column name")?);
        }
        if columns.is_empty() {
            return Err(EngineError::Syntax("PROJECT needs at least one column".into()));
        }
        self.expect("FROM")?;
        let source = self.name("a relation name")?;
        Ok(Command::Project { result, source, columns })
    }

    /// `R <- SELECT c op v FROM T` where v is a literal or a column.
    fn select(&mut self, result: String) -> Result<Command> {
        let column = self.name("a column name")?;
        let op = self.operator()?;
        let operand_token = self.name("a literal or column name")?;
        let operand = match operand_token.parse::<i32>() {
            Ok(value) => Operand::Literal(value),
            Err(_) => Operand::Column(operand_token),
        };
        self.expect("FROM")?;
        let source = self.name("a relation name")?;
        Ok(Command::Select {
            result,
            source,
            condition: Condition { column, op, operand },
        })
    }

    /// `R <- SEARCH FROM T WHERE c op v`
    fn search(&mut self, result: String) -> Result<Command> {
        self.expect("FROM")?;
        let source = self.name("a relation name")?;
        self.expect("WHERE")?;
        let column = self.name("a column name")?;
        let op = self.operator()?;
        let value = self.integer()?;
        Ok(Command::Search { result, source, column, op, value })
    }

    /// `R <- JOIN T1, T2 ON c1 c2`
    fn join(&mut self, result: String) -> Result<Command> {
        let left = self.name("a relation name")?;
        self.skip_commas();
        let right = self.name("a relation name")?;
        self.expect("ON")?;
        let left_column = self.name("a column name")?;
        let right_column = self.name("a column name")?;
        Ok(Command::Join { result, left, right, left_column, right_column })
    }

    /// `R <- CROSS T1 T2`
    fn cross(&mut self, result: String) -> Result<Command> {
        let left = self.name("a relation name")?;
        self.skip_commas();
        let right = self.name("a relation name")?;
        Ok(Command::Cross { result, left, right })
    }

    /// `SORT T BY c1, ..., ck IN d1, ..., dk`
    fn sort(&mut self) -> Result<Command> {
        let table = self.name("a relation name")?;
        self.expect("BY")?;

        let mut columns = Vec::new();
        loop {
            self.skip_commas();
            if self.peek() == Some("IN") {
                break;
            }
            columns.push(self.name("a column name")?);
        }
        self.expect("IN")?;

        let mut orders = Vec::new();
        while self.peek().is_some() {
            self.skip_commas();
            let token = self.advance()?;
            let order = SortOrder::parse(token)
                .ok_or_else(|| EngineError::Syntax(format!("expected ASC or DESC, got '{token}'")))?;
            orders.push(order);
        }

        if columns.is_empty() || columns.len() != orders.len() {
            return Err(EngineError::Syntax(
                "SORT needs one sorting direction per column".into(),
            ));
        }
        let keys = columns
            .into_iter()
            .zip(orders)
            .map(|(column, order)| SortKey { column, order })
            .collect();
        Ok(Command::Sort { table, keys })
    }

    /// `R <- ORDER BY c ASC|DESC ON T`
    fn order_by(&mut self, result: String) -> Result<Command> {
        self.expect("BY")?;
        let column = self.name("a column name")?;
        let token = self.advance()?;
        let order = SortOrder::parse(token)
            .ok_or_else(|| EngineError::Syntax(format!("expected ASC or DESC, got '{token}'")))?;
        self.expect("ON")?;
        let source = self.name("a relation name")?;
        Ok(Command::OrderBy {
            result,
            source,
            key: SortKey { column, order },
        })
    }

    /// `R <- GROUP BY gc FROM T HAVING f(a) op v RETURN f(b)`
    fn group_by(&mut self, result: String) -> Result<Command> {
        self.expect("BY")?;
        let group_column = self.name("a column name")?;
        self.expect("FROM")?;
        let source = self.name("a relation name")?;
        self.expect("HAVING")?;
        let having = self.aggregate()?;
        let having_op = self.operator()?;
        let having_value = self.integer()?;
        self.expect("RETURN")?;
        let returning = self.aggregate()?;
        Ok(Command::GroupBy {
            result,
            source,
            group_column,
            having,
            having_op,
            having_value,
            returning,
        })
    }

    /// `f(col)` — the parentheses arrive as their own tokens.
    fn aggregate(&mut self) -> Result<AggregateExpr> {
        let token = self.advance()?;
        let function = AggregateFunction::parse(token).ok_or_else(|| {
            EngineError::Syntax(format!(
                "expected one of MIN, MAX, SUM, AVG, COUNT; got '{token}'"
            ))
        })?;
        self.expect("(")?;
        let column = self.name("a column name")?;
        self.expect(")")?;
        Ok(AggregateExpr { function, column })
    }

    /// `INSERT INTO T ( c1 = v1, c2 = v2, ... )`
    fn insert(&mut self) -> Result<Command> {
        self.expect("INTO")?;
        let table = self.name("a relation name")?;
        self.expect("(")?;

        let mut assignments = Vec::new();
        loop {
            self.skip_commas();
            if self.peek() == Some(")") {
                break;
            }
            let column = self.name("a column name")?;
            self.expect("=")?;
            let value = self.integer()?;
            assignments.push((column, value));
        }
        self.expect(")")?;

        if assignments.is_empty() {
            return Err(EngineError::Syntax(
                "INSERT needs at least one column = value assignment".into(),
            ));
        }
        Ok(Command::Insert { table, assignments })
    }

    /// `UPDATE T WHERE c op v SET c2 = v2`
    fn update(&mut self) -> Result<Command> {
        let table = self.name("a relation name")?;
        self.expect("WHERE")?;
        let column = self.name("a column name")?;
        let op = self.operator()?;
        let value = self.integer()?;
        self.expect("SET")?;
        let set_column = self.name("a column name")?;
        self.expect("=")?;
        let set_value = self.integer()?;
        Ok(Command::Update {
            table,
            condition: Condition {
                column,
                op,
                operand: Operand::Literal(value),
            },
            set_column,
            set_value,
        })
    }

    /// `DELETE FROM T WHERE c op v`
    fn delete(&mut self) -> Result<Command> {
        self.expect("FROM")?;
        let table = self.name("a relation name")?;
        self.expect("WHERE")?;
        let column = self.name("a column name")?;
        let op = self.operator()?;
        let value = self.integer()?;
        Ok(Command::Delete {
            table,
            condition: Condition {
                column,
                op,
                operand: Operand::Literal(value),
            },
        })
    }
}
