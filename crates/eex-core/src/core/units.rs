//! Unit expressions and conversion factors.
//!
//! Units are written as products and quotients of named units with integer
//! powers, e.g. `kcal / mol / angstrom ** 2` or `(kJ / mol) * nm ** -2`.
//! Every named unit is expressed in SI base units over six dimensions:
//! length, mass, time, charge, amount of substance and plane angle.

use phf::{Map, phf_map};
use thiserror::Error;

/// Exponents of length, mass, time, charge, amount and angle.
pub type Dimensions = [i8; 6];

const NONE: Dimensions = [0, 0, 0, 0, 0, 0];
const LENGTH: Dimensions = [1, 0, 0, 0, 0, 0];
const MASS: Dimensions = [0, 1, 0, 0, 0, 0];
const TIME: Dimensions = [0, 0, 1, 0, 0, 0];
const CHARGE: Dimensions = [0, 0, 0, 1, 0, 0];
const AMOUNT: Dimensions = [0, 0, 0, 0, 1, 0];
const ANGLE: Dimensions = [0, 0, 0, 0, 0, 1];
const ENERGY: Dimensions = [2, 1, -2, 0, 0, 0];

static UNITS: Map<&'static str, (f64, Dimensions)> = phf_map! {
    "dimensionless" => (1.0, NONE),
    "meter" => (1.0, LENGTH), "meters" => (1.0, LENGTH), "m" => (1.0, LENGTH),
    "angstrom" => (1.0e-10, LENGTH), "angstroms" => (1.0e-10, LENGTH), "å" => (1.0e-10, LENGTH),
    "nanometer" => (1.0e-9, LENGTH), "nanometers" => (1.0e-9, LENGTH), "nm" => (1.0e-9, LENGTH),
    "picometer" => (1.0e-12, LENGTH), "picometers" => (1.0e-12, LENGTH), "pm" => (1.0e-12, LENGTH),
    "bohr" => (5.291_772_109_03e-11, LENGTH),
    "kilogram" => (1.0, MASS), "kg" => (1.0, MASS),
    "gram" => (1.0e-3, MASS), "grams" => (1.0e-3, MASS), "g" => (1.0e-3, MASS),
    "amu" => (1.660_539_066_60e-27, MASS), "dalton" => (1.660_539_066_60e-27, MASS),
    "da" => (1.660_539_066_60e-27, MASS),
    "second" => (1.0, TIME), "seconds" => (1.0, TIME), "s" => (1.0, TIME),
    "femtosecond" => (1.0e-15, TIME), "femtoseconds" => (1.0e-15, TIME), "fs" => (1.0e-15, TIME),
    "picosecond" => (1.0e-12, TIME), "picoseconds" => (1.0e-12, TIME), "ps" => (1.0e-12, TIME),
    "nanosecond" => (1.0e-9, TIME), "nanoseconds" => (1.0e-9, TIME), "ns" => (1.0e-9, TIME),
    "coulomb" => (1.0, CHARGE), "c" => (1.0, CHARGE),
    "elementary_charge" => (1.602_176_634e-19, CHARGE), "e" => (1.602_176_634e-19, CHARGE),
    "mol" => (1.0, AMOUNT), "mole" => (1.0, AMOUNT),
    "radian" => (1.0, ANGLE), "radians" => (1.0, ANGLE), "rad" => (1.0, ANGLE),
    "degree" => (std::f64::consts::PI / 180.0, ANGLE),
    "degrees" => (std::f64::consts::PI / 180.0, ANGLE),
    "deg" => (std::f64::consts::PI / 180.0, ANGLE),
    "joule" => (1.0, ENERGY), "joules" => (1.0, ENERGY), "j" => (1.0, ENERGY),
    "kilojoule" => (1.0e3, ENERGY), "kilojoules" => (1.0e3, ENERGY), "kj" => (1.0e3, ENERGY),
    "calorie" => (4.184, ENERGY), "calories" => (4.184, ENERGY), "cal" => (4.184, ENERGY),
    "kilocalorie" => (4184.0, ENERGY), "kilocalories" => (4184.0, ENERGY),
    "kcal" => (4184.0, ENERGY),
    "electron_volt" => (1.602_176_634e-19, ENERGY), "ev" => (1.602_176_634e-19, ENERGY),
    "hartree" => (4.359_744_722_207_1e-18, ENERGY),
};

#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("Invalid unit expression '{expression}': {message}")]
    Syntax { expression: String, message: String },
    #[error("Unit expression '{0}' raises a dimension beyond the supported exponent range")]
    ExponentOutOfRange(String),
    #[error("Cannot convert '{from}' to '{to}': incompatible dimensions")]
    IncompatibleUnits { from: String, to: String },
}

/// Maps a pair of unit expressions to a multiplicative scale factor.
pub trait UnitConverter {
    /// Returns `f` such that `value_in_to = value_in_from * f`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::IncompatibleUnits`] when the dimensions differ, or a
    /// parse error when either expression is not understood.
    fn conversion_factor(&self, from: &str, to: &str) -> Result<f64, UnitError>;
}

/// A parsed unit: its size in SI base units and its dimension exponents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub factor: f64,
    pub dimensions: Dimensions,
}

impl Quantity {
    const ONE: Quantity = Quantity {
        factor: 1.0,
        dimensions: NONE,
    };

    /// `None` when a dimension exponent leaves the `i8` range.
    fn mul(self, rhs: Quantity) -> Option<Quantity> {
        let mut dimensions = self.dimensions;
        for (d, r) in dimensions.iter_mut().zip(rhs.dimensions) {
            *d = d.checked_add(r)?;
        }
        Some(Quantity {
            factor: self.factor * rhs.factor,
            dimensions,
        })
    }

    fn div(self, rhs: Quantity) -> Option<Quantity> {
        self.mul(rhs.powi(-1)?)
    }

    fn powi(self, exponent: i32) -> Option<Quantity> {
        let exponent = i8::try_from(exponent).ok()?;
        let mut dimensions = self.dimensions;
        for d in dimensions.iter_mut() {
            *d = d.checked_mul(exponent)?;
        }
        Some(Quantity {
            factor: self.factor.powi(exponent.into()),
            dimensions,
        })
    }
}

/// The built-in unit table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitRegistry;

impl UnitRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, expression: &str) -> Result<Quantity, UnitError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens: &tokens,
            pos: 0,
        };
        let quantity = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(quantity)
    }
}

impl UnitConverter for UnitRegistry {
    fn conversion_factor(&self, from: &str, to: &str) -> Result<f64, UnitError> {
        let source = self.parse(from)?;
        let target = self.parse(to)?;
        if source.dimensions != target.dimensions {
            return Err(UnitError::IncompatibleUnits {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(source.factor / target.factor)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(i32),
    Star,
    Power,
    Slash,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, UnitError> {
    let syntax = |message: String| UnitError::Syntax {
        expression: expression.to_string(),
        message,
    };
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Power);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '^' => {
                chars.next();
                tokens.push(Token::Power);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if c == '-' || c.is_ascii_digit() => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    text.push(d);
                    chars.next();
                }
                let value = text
                    .parse()
                    .map_err(|_| syntax(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_') {
                        break;
                    }
                    name.push(d);
                    chars.next();
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(syntax(format!("unexpected character '{}'", other))),
        }
    }
    if tokens.is_empty() {
        return Err(syntax("empty expression".to_string()));
    }
    Ok(tokens)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<Quantity, UnitError> {
        let mut value = self.power()?;
        loop {
            match self.tokens.get(self.pos) {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.power()?;
                    value = value.mul(rhs).ok_or_else(|| self.out_of_range())?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.power()?;
                    value = value.div(rhs).ok_or_else(|| self.out_of_range())?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn power(&mut self) -> Result<Quantity, UnitError> {
        let base = self.atom()?;
        if self.tokens.get(self.pos) == Some(&Token::Power) {
            self.pos += 1;
            match self.tokens.get(self.pos) {
                Some(Token::Number(exponent)) => {
                    self.pos += 1;
                    base.powi(*exponent).ok_or_else(|| self.out_of_range())
                }
                _ => Err(self.error("expected an integer exponent")),
            }
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<Quantity, UnitError> {
        match self.tokens.get(self.pos) {
            Some(Token::Name(name)) => {
                self.pos += 1;
                UNITS
                    .get(name.to_lowercase().as_str())
                    .map(|&(factor, dimensions)| Quantity { factor, dimensions })
                    .ok_or_else(|| UnitError::UnknownUnit(name.clone()))
            }
            Some(Token::Number(1)) => {
                self.pos += 1;
                Ok(Quantity::ONE)
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.tokens.get(self.pos) != Some(&Token::Close) {
                    return Err(self.error("unbalanced parenthesis"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(self.error("expected a unit name")),
        }
    }

    fn out_of_range(&self) -> UnitError {
        UnitError::ExponentOutOfRange(self.expression.to_string())
    }

    fn error(&self, message: &str) -> UnitError {
        UnitError::Syntax {
            expression: self.expression.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{} != {}", a, b);
    }

    #[test]
    fn identical_units_convert_with_factor_one() {
        let units = UnitRegistry::new();
        assert_close(units.conversion_factor("angstrom", "Angstrom").unwrap(), 1.0);
    }

    #[test]
    fn simple_length_conversion() {
        let units = UnitRegistry::new();
        assert_close(units.conversion_factor("nanometer", "angstrom").unwrap(), 10.0);
        assert_close(units.conversion_factor("picometers", "angstrom").unwrap(), 0.01);
    }

    #[test]
    fn compound_energy_per_area_conversion() {
        let units = UnitRegistry::new();
        let factor = units
            .conversion_factor("kcal / mol / angstrom ** 2", "kJ / mol / nm ** 2")
            .unwrap();
        assert_close(factor, 418.4);
    }

    #[test]
    fn parenthesised_expressions_and_caret_powers() {
        let units = UnitRegistry::new();
        let factor = units
            .conversion_factor("(kcal / mol) * angstrom^-2", "kcal / mol / angstrom ** 2")
            .unwrap();
        assert_close(factor, 1.0);
    }

    #[test]
    fn degrees_to_radians() {
        let units = UnitRegistry::new();
        assert_close(
            units.conversion_factor("degree", "radian").unwrap(),
            std::f64::consts::PI / 180.0,
        );
    }

    #[test]
    fn amu_and_dalton_are_equivalent() {
        let units = UnitRegistry::new();
        assert_close(units.conversion_factor("amu", "dalton").unwrap(), 1.0);
    }

    #[test]
    fn incompatible_dimensions_are_rejected() {
        let units = UnitRegistry::new();
        assert_eq!(
            units.conversion_factor("angstrom", "kcal"),
            Err(UnitError::IncompatibleUnits {
                from: "angstrom".into(),
                to: "kcal".into()
            })
        );
    }

    #[test]
    fn unknown_unit_is_reported() {
        let units = UnitRegistry::new();
        assert_eq!(
            units.conversion_factor("furlong", "meter"),
            Err(UnitError::UnknownUnit("furlong".into()))
        );
    }

    #[test]
    fn malformed_expressions_are_syntax_errors() {
        let units = UnitRegistry::new();
        assert!(matches!(units.parse("kcal /"), Err(UnitError::Syntax { .. })));
        assert!(matches!(units.parse("(kcal"), Err(UnitError::Syntax { .. })));
        assert!(matches!(units.parse("kcal ** x"), Err(UnitError::Syntax { .. })));
        assert!(matches!(units.parse(""), Err(UnitError::Syntax { .. })));
    }

    #[test]
    fn oversized_exponents_are_reported_instead_of_wrapping() {
        let units = UnitRegistry::new();
        for expr in ["kcal ** 64", "angstrom ** 300", "(m ** 100) * m ** 100", "1 / m ** -128"] {
            assert_eq!(
                units.parse(expr).unwrap_err(),
                UnitError::ExponentOutOfRange(expr.to_string())
            );
        }
        assert_eq!(
            units.conversion_factor("kcal ** 64", "kcal ** 64"),
            Err(UnitError::ExponentOutOfRange("kcal ** 64".to_string()))
        );
        assert_close(units.conversion_factor("m ** 127", "m ** 127").unwrap(), 1.0);
    }
}
