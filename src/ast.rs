//! Parsed command values. The parser produces these; the executors
//! consume them.

use std::fmt;

/// Comparison operators usable in WHERE and HAVING clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOperator {
    pub fn parse(token: &str) -> Option<BinaryOperator> {
        match token {
            "<" => Some(BinaryOperator::LessThan),
            ">" => Some(BinaryOperator::GreaterThan),
            "<=" | "=<" => Some(BinaryOperator::LessEqual),
            ">=" | "=>" => Some(BinaryOperator::GreaterEqual),
            "==" => Some(BinaryOperator::Equal),
            "!=" => Some(BinaryOperator::NotEqual),
            _ => None,
        }
    }

    pub fn eval(self, left: i64, right: i64) -> bool {
        match self {
            BinaryOperator::LessThan => left < right,
            BinaryOperator::GreaterThan => left > right,
            BinaryOperator::LessEqual => left <= right,
            BinaryOperator::GreaterEqual => left >= right,
            BinaryOperator::Equal => left == right,
            BinaryOperator::NotEqual => left != right,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a comparison: an integer literal or another column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(i32),
    Column(String),
}

/// A `column op operand` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub op: BinaryOperator,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(token: &str) -> Option<SortOrder> {
        match token {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateFunction {
    pub fn parse(token: &str) -> Option<AggregateFunction> {
        match token {
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "COUNT" => Some(AggregateFunction::Count),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
        }
    }

    /// Apply the aggregate over a group's values, accumulating in 64 bits
    /// so intermediate sums cannot overflow. COUNT of an empty slice is
    /// 0; groups are never empty in the GROUP BY flow.
    pub fn apply(self, values: &[i32]) -> i64 {
        match self {
            AggregateFunction::Count => values.len() as i64,
            AggregateFunction::Sum => values.iter().map(|&v| v as i64).sum(),
            AggregateFunction::Avg => {
                if values.is_empty() {
                    0
                } else {
                    let sum: i64 = values.iter().map(|&v| v as i64).sum();
                    sum / values.len() as i64
                }
            }
            AggregateFunction::Min => values.iter().copied().min().map_or(0, |v| v as i64),
            AggregateFunction::Max => values.iter().copied().max().map_or(0, |v| v as i64),
        }
    }
}

/// An aggregate applied to a column, e.g. `AVG(SAL)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub column: String,
}

/// One concrete command of the language, carrying its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load {
        table: String,
    },
    Print {
        table: String,
    },
    Export {
        table: String,
    },
    Clear {
        table: String,
    },
    ListTables,
    Rename {
        table: String,
        from: String,
        to: String,
    },
    Source {
        file: String,
    },
    Project {
        result: String,
        source: String,
        columns: Vec<String>,
    },
    Select {
        result: String,
        source: String,
        condition: Condition,
    },
    Search {
        result: String,
        source: String,
        column: String,
        op: BinaryOperator,
        value: i32,
    },
    Cross {
        result: String,
        left: String,
        right: String,
    },
    Join {
        result: String,
        left: String,
        right: String,
        left_column: String,
        right_column: String,
    },
    Distinct {
        result: String,
        source: String,
    },
    Sort {
        table: String,
        keys: Vec<SortKey>,
    },
    OrderBy {
        result: String,
        source: String,
        key: SortKey,
    },
    GroupBy {
        result: String,
        source: String,
        group_column: String,
        having: AggregateExpr,
        having_op: BinaryOperator,
        having_value: i32,
        returning: AggregateExpr,
    },
    Insert {
        table: String,
        assignments: Vec<(String, i32)>,
    },
    Update {
        table: String,
        condition: Condition,
        set_column: String,
        set_value: i32,
    },
    Delete {
        table: String,
        condition: Condition,
    },
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_eval_covers_the_six_comparisons() {
        use BinaryOperator::*;
        assert!(LessThan.eval(1, 2));
        assert!(GreaterThan.eval(2, 1));
        assert!(LessEqual.eval(2, 2));
        assert!(GreaterEqual.eval(2, 2));
        assert!(Equal.eval(-5, -5));
        assert!(NotEqual.eval(1, 2));
        assert!(!LessThan.eval(2, 1));
    }

    #[test]
    fn aggregates_accumulate_in_64_bits() {
        let values = vec![i32::MAX, i32::MAX];
        assert_eq!(AggregateFunction::Sum.apply(&values), 2 * i32::MAX as i64);
        assert_eq!(AggregateFunction::Avg.apply(&values), i32::MAX as i64);
    }

    #[test]
    fn avg_is_integer_division() {
        assert_eq!(AggregateFunction::Avg.apply(&[1, 2]), 1);
        assert_eq!(AggregateFunction::Avg.apply(&[10, 30]), 20);
    }

    #[test]
    fn count_of_empty_is_zero() {
        assert_eq!(AggregateFunction::Count.apply(&[]), 0);
    }
}
