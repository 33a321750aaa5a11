//! Band-math formulas carried by `Expression` nodes.
//!
//! Grammar: `+ - * /`, parentheses, unary minus, decimal numbers and band
//! names (`[A-Za-z_][A-Za-z0-9_]*`). Division by a value near zero gives NaN.
use crate::engine::image::Raster;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Band(String),
    Op(char),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Band(String),
    BinOp {
        op: char,
        left: Box<Node>,
        right: Box<Node>,
    },
    Neg(Box<Node>),
}

/// Parsed formula, ready to evaluate against an image's bands.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    root: Node,
}

fn tokenize(formula: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = formula.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(chars[i]));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| Error::Formula(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Band(chars[start..i].iter().collect()));
            }
            c => {
                return Err(Error::Formula(format!(
                    "unexpected character '{}' in '{}'",
                    c, formula
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.term()?;
            left = Node::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// term = factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Node> {
        let mut left = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.factor()?;
            left = Node::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// factor = number | band | '(' expr ')' | ('-' | '+') factor
    fn factor(&mut self) -> Result<Node> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Node::Num(n)),
            Some(Token::Band(name)) => Ok(Node::Band(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::Formula("expected closing parenthesis".into())),
                }
            }
            Some(Token::Op('-')) => Ok(Node::Neg(Box::new(self.factor()?))),
            Some(Token::Op('+')) => self.factor(),
            other => Err(Error::Formula(format!("unexpected token {:?}", other))),
        }
    }
}

fn apply(op: char, a: f64, b: f64) -> f64 {
    match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        _ => {
            if b.abs() < 1e-10 {
                f64::NAN
            } else {
                a / b
            }
        }
    }
}

impl Formula {
    pub fn parse(formula: &str) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(formula)?,
            pos: 0,
        };
        let root = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(Error::Formula(format!(
                "trailing {:?} in '{}'",
                extra, formula
            )));
        }
        Ok(Self { root })
    }

    /// Band names referenced, in first-use order.
    pub fn bands(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_bands(&self.root, &mut names);
        names
    }

    pub fn evaluate<'a, F>(&self, lookup: F) -> Result<Raster>
    where
        F: Fn(&str) -> Option<&'a Raster>,
    {
        eval(&self.root, &lookup)
    }
}

fn collect_bands(node: &Node, names: &mut Vec<String>) {
    match node {
        Node::Band(name) => {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Node::BinOp { left, right, .. } => {
            collect_bands(left, names);
            collect_bands(right, names);
        }
        Node::Neg(inner) => collect_bands(inner, names),
        Node::Num(_) => {}
    }
}

fn eval<'a, F>(node: &Node, lookup: &F) -> Result<Raster>
where
    F: Fn(&str) -> Option<&'a Raster>,
{
    match node {
        Node::Num(n) => Ok(Raster::Constant(*n)),
        Node::Band(name) => lookup(name)
            .cloned()
            .ok_or_else(|| Error::Evaluation(format!("band '{}' not found", name))),
        Node::BinOp { op, left, right } => {
            let l = eval(left, lookup)?;
            let r = eval(right, lookup)?;
            match op {
                '+' => l.zip_with(&r, |a, b| apply('+', a, b)),
                '-' => l.zip_with(&r, |a, b| apply('-', a, b)),
                '*' => l.zip_with(&r, |a, b| apply('*', a, b)),
                _ => l.zip_with(&r, |a, b| apply('/', a, b)),
            }
        }
        Node::Neg(inner) => Ok(eval(inner, lookup)?.map(|v| -v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashMap;

    fn bands(pairs: &[(&str, Raster)]) -> HashMap<String, Raster> {
        pairs
            .iter()
            .map(|(n, r)| (n.to_string(), r.clone()))
            .collect()
    }

    #[test]
    fn normalized_difference_on_constants() {
        let b = bands(&[("nir", Raster::Constant(0.8)), ("red", Raster::Constant(0.2))]);
        let f = Formula::parse("(nir - red) / (nir + red)").unwrap();
        let v = f.evaluate(|n| b.get(n)).unwrap().as_constant().unwrap();
        assert!((v - 0.6).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn precedence_and_unary_minus() {
        let f = Formula::parse("-2 + 3 * 4").unwrap();
        let v = f.evaluate(|_| None).unwrap();
        assert_eq!(v, Raster::Constant(10.0));
    }

    #[test]
    fn grids_evaluate_element_wise() {
        let b = bands(&[
            ("nir", Raster::Grid(array![[0.9, 0.5]])),
            ("red", Raster::Constant(0.1)),
        ]);
        let f = Formula::parse("nir - red").unwrap();
        match f.evaluate(|n| b.get(n)).unwrap() {
            Raster::Grid(g) => {
                assert!((g[[0, 0]] - 0.8).abs() < 1e-9);
                assert!((g[[0, 1]] - 0.4).abs() < 1e-9);
            }
            other => panic!("expected a grid, got {:?}", other),
        }
    }

    #[test]
    fn division_by_zero_is_nan() {
        let f = Formula::parse("1 / (a - a)").unwrap();
        let b = bands(&[("a", Raster::Constant(3.0))]);
        assert!(f.evaluate(|n| b.get(n)).unwrap().as_constant().unwrap().is_nan());
    }

    #[test]
    fn referenced_bands_in_order() {
        let f = Formula::parse("2.5 * (nir - red) / (nir + 6 * red - 7.5 * blue + 1)").unwrap();
        assert_eq!(f.bands(), vec!["nir", "red", "blue"]);
    }

    #[test]
    fn missing_band_is_an_evaluation_error() {
        let f = Formula::parse("B6 + 1").unwrap();
        assert!(matches!(f.evaluate(|_| None), Err(Error::Evaluation(_))));
    }

    #[test]
    fn malformed_formulas() {
        assert!(matches!(Formula::parse("(a + b"), Err(Error::Formula(_))));
        assert!(matches!(Formula::parse("a $ b"), Err(Error::Formula(_))));
        assert!(matches!(Formula::parse("a b"), Err(Error::Formula(_))));
    }
}
