use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static ORDER_ALIASES: Map<&'static str, u8> = phf_map! {
    "bond" => 2, "bonds" => 2,
    "angle" => 3, "angles" => 3,
    "dihedral" => 4, "dihedrals" => 4,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Did not understand term order '{0}'")]
pub struct UnknownOrderError(pub String);

/// The arity of a bonded interaction: 2 (bond) through 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermOrder(u8);

impl TermOrder {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 7;

    pub const BOND: TermOrder = TermOrder(2);
    pub const ANGLE: TermOrder = TermOrder(3);
    pub const DIHEDRAL: TermOrder = TermOrder(4);

    pub fn new(order: u8) -> Result<Self, UnknownOrderError> {
        if (Self::MIN..=Self::MAX).contains(&order) {
            Ok(Self(order))
        } else {
            Err(UnknownOrderError(order.to_string()))
        }
    }

    pub fn all() -> impl Iterator<Item = TermOrder> {
        (Self::MIN..=Self::MAX).map(TermOrder)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Number of atoms participating in one term of this order.
    pub fn arity(self) -> usize {
        self.0 as usize
    }

    /// Atom-index column names, `atom1` through `atomN`.
    pub fn index_columns(self) -> Vec<String> {
        (1..=self.arity()).map(|i| format!("atom{}", i)).collect()
    }

    /// Name of the backend table holding connectivity rows of this order.
    pub fn table_name(self) -> String {
        format!("term{}", self.0)
    }
}

impl fmt::Display for TermOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TermOrder {
    type Err = UnknownOrderError;

    /// Accepts `2`..`7` and the aliases `bond(s)`, `angle(s)`, `dihedral(s)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if let Some(&order) = ORDER_ALIASES.get(key.as_str()) {
            return Ok(Self(order));
        }
        key.parse::<u8>()
            .ok()
            .and_then(|n| Self::new(n).ok())
            .ok_or_else(|| UnknownOrderError(s.to_string()))
    }
}

impl TryFrom<u8> for TermOrder {
    type Error = UnknownOrderError;

    fn try_from(order: u8) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}

impl TryFrom<&str> for TermOrder {
    type Error = UnknownOrderError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        key.parse()
    }
}

/// Anything that names a term order: a [`TermOrder`], an integer, or a string
/// key such as `"2"` or `"bonds"`.
pub trait OrderKey {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError>;
}

impl OrderKey for TermOrder {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        Ok(*self)
    }
}

impl OrderKey for i32 {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        u8::try_from(*self)
            .ok()
            .and_then(|n| TermOrder::new(n).ok())
            .ok_or_else(|| UnknownOrderError(self.to_string()))
    }
}

impl OrderKey for u8 {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        TermOrder::new(*self)
    }
}

impl OrderKey for usize {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        u8::try_from(*self)
            .ok()
            .and_then(|n| TermOrder::new(n).ok())
            .ok_or_else(|| UnknownOrderError(self.to_string()))
    }
}

impl OrderKey for &str {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        self.parse()
    }
}

impl OrderKey for String {
    fn to_order(&self) -> Result<TermOrder, UnknownOrderError> {
        self.parse()
    }
}

/// A named mathematical expression describing one kind of bonded term.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionalForm {
    /// Human-readable energy expression, e.g. `K*(r-R0)**2`.
    pub expression: String,
    /// Parameter names in canonical order.
    pub parameters: Vec<String>,
    /// Unit expression for every parameter.
    #[serde(default)]
    pub units: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl FunctionalForm {
    pub fn new(
        expression: &str,
        parameters: &[&str],
        units: &[(&str, &str)],
        description: &str,
    ) -> Self {
        Self {
            expression: expression.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            units: units
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            description: description.to_string(),
        }
    }

    pub fn parameter_position(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == name)
    }
}

pub(super) fn builtin_forms() -> BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>> {
    let mut forms: BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>> =
        TermOrder::all().map(|o| (o, BTreeMap::new())).collect();

    let mut add = |order: TermOrder, name: &str, form: FunctionalForm| {
        forms.entry(order).or_default().insert(name.to_string(), form);
    };

    add(
        TermOrder::BOND,
        "harmonic",
        FunctionalForm::new(
            "K*(r-R0)**2",
            &["K", "R0"],
            &[("K", "kcal / mol / angstrom ** 2"), ("R0", "angstrom")],
            "A harmonic bond stretch",
        ),
    );
    add(
        TermOrder::BOND,
        "morse",
        FunctionalForm::new(
            "D*(1 - exp(-alpha*(r-r0)))**2",
            &["D", "alpha", "r0"],
            &[
                ("D", "kcal / mol"),
                ("alpha", "angstrom ** -1"),
                ("r0", "angstrom"),
            ],
            "A Morse bond stretch",
        ),
    );
    add(
        TermOrder::BOND,
        "fene",
        FunctionalForm::new(
            "-0.5*K*R0**2*ln(1-(r/R0)**2) + 4*epsilon*((sigma/r)**12 - (sigma/r)**6) + epsilon",
            &["K", "R0", "epsilon", "sigma"],
            &[
                ("K", "kcal / mol / angstrom ** 2"),
                ("R0", "angstrom"),
                ("epsilon", "kcal / mol"),
                ("sigma", "angstrom"),
            ],
            "A finite extensible nonlinear elastic bond",
        ),
    );
    add(
        TermOrder::ANGLE,
        "harmonic",
        FunctionalForm::new(
            "K*(theta-theta0)**2",
            &["K", "theta0"],
            &[("K", "kcal / mol / radian ** 2"), ("theta0", "degree")],
            "A harmonic angle bend",
        ),
    );
    add(
        TermOrder::ANGLE,
        "cosine",
        FunctionalForm::new(
            "K*(1+cos(theta))",
            &["K"],
            &[("K", "kcal / mol")],
            "A cosine angle bend",
        ),
    );
    add(
        TermOrder::DIHEDRAL,
        "charmm",
        FunctionalForm::new(
            "K*(1+cos(n*phi-d))",
            &["K", "n", "d", "w"],
            &[
                ("K", "kcal / mol"),
                ("n", "dimensionless"),
                ("d", "degree"),
                ("w", "dimensionless"),
            ],
            "A CHARMM periodic torsion with a 1-4 weighting factor",
        ),
    );
    add(
        TermOrder::DIHEDRAL,
        "harmonic",
        FunctionalForm::new(
            "K*(phi-phi0)**2",
            &["K", "phi0"],
            &[("K", "kcal / mol / radian ** 2"), ("phi0", "degree")],
            "A harmonic torsion",
        ),
    );
    add(
        TermOrder::DIHEDRAL,
        "opls",
        FunctionalForm::new(
            "0.5*K1*(1+cos(phi)) + 0.5*K2*(1-cos(2*phi)) + 0.5*K3*(1+cos(3*phi)) + 0.5*K4*(1-cos(4*phi))",
            &["K1", "K2", "K3", "K4"],
            &[
                ("K1", "kcal / mol"),
                ("K2", "kcal / mol"),
                ("K3", "kcal / mol"),
                ("K4", "kcal / mol"),
            ],
            "An OPLS four-term Fourier torsion",
        ),
    );

    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_orders_and_aliases() {
        assert_eq!("2".parse::<TermOrder>(), Ok(TermOrder::BOND));
        assert_eq!("Angles".parse::<TermOrder>(), Ok(TermOrder::ANGLE));
        assert_eq!("dihedral".parse::<TermOrder>(), Ok(TermOrder::DIHEDRAL));
        assert_eq!("7".parse::<TermOrder>().map(|o| o.arity()), Ok(7));
    }

    #[test]
    fn rejects_orders_outside_two_to_seven() {
        assert_eq!(
            "8".parse::<TermOrder>(),
            Err(UnknownOrderError("8".into()))
        );
        assert!(TermOrder::new(1).is_err());
        assert!("impropers".parse::<TermOrder>().is_err());
    }

    #[test]
    fn order_keys_accept_integers_and_strings() {
        assert_eq!(3i32.to_order(), Ok(TermOrder::ANGLE));
        assert_eq!("dihedrals".to_order(), Ok(TermOrder::DIHEDRAL));
        assert_eq!(2usize.to_order(), Ok(TermOrder::BOND));
        assert!((-2i32).to_order().is_err());
        assert!(300i32.to_order().is_err());
    }

    #[test]
    fn index_columns_follow_arity() {
        assert_eq!(TermOrder::ANGLE.index_columns(), vec!["atom1", "atom2", "atom3"]);
        assert_eq!(TermOrder::BOND.table_name(), "term2");
    }

    #[test]
    fn builtin_forms_have_units_for_every_parameter() {
        for (order, forms) in builtin_forms() {
            for (name, form) in forms {
                for p in &form.parameters {
                    assert!(
                        form.units.contains_key(p),
                        "order {} form {} lacks units for {}",
                        order,
                        name,
                        p
                    );
                }
            }
        }
    }
}
