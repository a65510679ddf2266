//! Core domain types for the order engine.
//!
//! All identifier and value types use smart constructors so that invalid
//! values cannot exist past the system boundary, following the
//! "parse, don't validate" principle.

use nutype::nutype;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::errors::ValidationError;

/// Order identifier with validation.
///
/// Format: ORD-{UPPERCASE_ALPHANUMERIC}
/// Example: ORD-A1B2C3D4
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 50, regex = r"^ORD-[A-Z0-9]+$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a new order ID with a random UUIDv7 suffix.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7().simple().to_string().to_uppercase();
        Self::try_new(format!("ORD-{}", &uuid[..8])).expect("Generated OrderId should be valid")
    }
}

/// Product identifier with validation.
///
/// Format: PRD-{UPPERCASE_ALPHANUMERIC}
/// Example: PRD-LAPTOP01
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 50, regex = r"^PRD-[A-Z0-9]+$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct ProductId(String);

impl ProductId {
    /// Generate a new product ID with a random UUIDv7 suffix.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7().simple().to_string().to_uppercase();
        Self::try_new(format!("PRD-{}", &uuid[..8])).expect("Generated ProductId should be valid")
    }
}

/// Identifier of a user as issued by the external auth collaborator.
///
/// The engine never creates users; it only records ownership and checks it
/// during authorization.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct UserId(String);

/// Customer email address used as the notification recipient.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 255,
        regex = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct CustomerEmail(String);

/// Shipment tracking number assigned when an order ships.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Generate a carrier-style tracking number (TRK- + 12 alphanumerics).
    ///
    /// Used when an admin marks an order shipped without supplying one.
    pub fn generate() -> Self {
        use rand::distr::Alphanumeric;
        use rand::Rng;

        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        Self::try_new(format!("TRK-{}", suffix.to_uppercase()))
            .expect("Generated TrackingNumber should be valid")
    }
}

/// Quantity of a product, either on an order line or in stock.
///
/// Order-line quantities must be positive; inventory levels may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// Maximum quantity per order line or stock level.
    pub const MAX: u32 = 1_000_000;

    /// Create an order-line quantity (must be at least 1).
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidQuantity(
                "Quantity must be greater than 0".to_string(),
            ));
        }
        Self::for_inventory(value)
    }

    /// Create an inventory quantity (zero allowed).
    pub fn for_inventory(value: u32) -> Result<Self, ValidationError> {
        if value > Self::MAX {
            return Err(ValidationError::InvalidQuantity(format!(
                "Quantity {} exceeds maximum {}",
                value,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// The zero inventory quantity.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Get the underlying value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Add quantities, rejecting overflow past [`Self::MAX`].
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        let value = self.0.checked_add(other.0).ok_or_else(|| {
            ValidationError::InvalidQuantity("Quantity overflow".to_string())
        })?;
        Self::for_inventory(value)
    }

    /// Subtract a quantity; `None` when `other` exceeds `self`.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount with validation.
///
/// Uses `Decimal` for precise financial arithmetic. Must be non-negative
/// with at most 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Maximum money amount (100 million).
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

    /// Create money from cents (avoids floating point issues).
    pub fn from_cents(cents: u64) -> Result<Self, ValidationError> {
        let cents = i64::try_from(cents).map_err(|_| {
            ValidationError::InvalidMoney(format!("Amount {cents} cents is too large"))
        })?;
        Self::new(Decimal::new(cents, 2))
    }

    /// Create money from a decimal amount.
    pub fn new(amount: Decimal) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() {
            return Err(ValidationError::InvalidMoney(format!(
                "Money amount cannot be negative: {amount}"
            )));
        }
        if amount.scale() > 2 {
            return Err(ValidationError::InvalidMoney(format!(
                "Money amount cannot have more than 2 decimal places: {amount}"
            )));
        }
        if amount > Self::MAX_AMOUNT {
            return Err(ValidationError::InvalidMoney(format!(
                "Money amount {} exceeds maximum {}",
                amount,
                Self::MAX_AMOUNT
            )));
        }
        Ok(Self(amount))
    }

    /// The zero amount.
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying decimal value.
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Convert to cents.
    pub fn to_cents(self) -> u64 {
        (self.0 * Decimal::from(100)).to_u64().unwrap_or(0)
    }

    /// Add money amounts, rejecting overflow past [`Self::MAX_AMOUNT`].
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        Self::new(self.0 + other.0)
    }

    /// Subtract, flooring at zero.
    ///
    /// The stats ledger relies on this: reversing more revenue than was ever
    /// recorded must leave the ledger at zero, never negative.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self(Decimal::ZERO)
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Multiply a unit price by an order-line quantity.
    pub fn multiply_by_quantity(self, quantity: Quantity) -> Result<Self, ValidationError> {
        Self::new(self.0 * Decimal::from(quantity.value()))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::str::FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let amount_str = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let decimal = amount_str.parse::<Decimal>().map_err(|e| {
            ValidationError::InvalidMoney(format!("Failed to parse money amount '{s}': {e}"))
        })?;

        Self::new(decimal)
    }
}

/// Role granted to an actor by the external auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular storefront customer.
    Customer,
    /// An administrator with ship/deliver and cross-user privileges.
    Admin,
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

/// The authenticated caller of a lifecycle operation.
///
/// Supplied by the external auth collaborator on every call; the engine
/// trusts the role it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The caller's user id.
    pub id: UserId,
    /// The caller's role.
    pub role: Role,
}

impl Actor {
    /// Create a new actor.
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether the actor holds the admin capability.
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Whether the actor owns the resource belonging to `owner`.
    pub fn owns(&self, owner: &UserId) -> bool {
        &self.id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_id_generation() {
        let id = OrderId::generate();
        assert!(id.as_ref().starts_with("ORD-"));
        assert!(id.as_ref().len() <= 50);
    }

    #[test]
    fn order_id_validation() {
        assert!(OrderId::try_new("ORD-ABC123".to_string()).is_ok());
        assert!(OrderId::try_new("ORD-".to_string()).is_err());
        assert!(OrderId::try_new("abc-123".to_string()).is_err());
        assert!(OrderId::try_new("ORD-abc".to_string()).is_err()); // lowercase not allowed
    }

    #[test]
    fn product_id_validation() {
        assert!(ProductId::try_new("PRD-LAPTOP01".to_string()).is_ok());
        assert!(ProductId::try_new("PRD-".to_string()).is_err());
        assert!(ProductId::try_new("prd-laptop".to_string()).is_err());
    }

    #[test]
    fn user_id_rejects_empty() {
        assert!(UserId::try_new("u-1".to_string()).is_ok());
        assert!(UserId::try_new("   ".to_string()).is_err());
        assert!(UserId::try_new("a".repeat(65)).is_err());
    }

    #[test]
    fn customer_email_validation() {
        assert!(CustomerEmail::try_new("user@example.com".to_string()).is_ok());
        assert!(CustomerEmail::try_new("test.email+tag@domain.co.uk".to_string()).is_ok());
        assert!(CustomerEmail::try_new("invalid-email".to_string()).is_err());
        assert!(CustomerEmail::try_new("@domain.com".to_string()).is_err());
    }

    #[test]
    fn tracking_number_generation() {
        let tracking = TrackingNumber::generate();
        assert!(tracking.as_ref().starts_with("TRK-"));
        assert_eq!(tracking.as_ref().len(), 16);
    }

    #[test]
    fn quantity_validation() {
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::for_inventory(0).is_ok());
        assert!(Quantity::for_inventory(Quantity::MAX + 1).is_err());
    }

    #[test]
    fn quantity_arithmetic() {
        let five = Quantity::new(5).unwrap();
        let three = Quantity::new(3).unwrap();

        assert_eq!(five.checked_add(three).unwrap().value(), 8);
        assert_eq!(five.checked_sub(three), Some(Quantity::new(2).unwrap()));
        assert_eq!(three.checked_sub(five), None);
    }

    #[test]
    fn money_validation() {
        assert!(Money::from_cents(100).is_ok()); // $1.00
        assert!(Money::new(dec!(10.50)).is_ok());
        assert!(Money::new(dec!(-1.00)).is_err());
        assert!(Money::new(dec!(1.001)).is_err()); // 3 decimal places
    }

    #[test]
    fn money_saturating_sub_floors_at_zero() {
        let small = Money::from_cents(100).unwrap();
        let large = Money::from_cents(250).unwrap();

        assert_eq!(large.saturating_sub(small).to_cents(), 150);
        assert_eq!(small.saturating_sub(large), Money::zero());
        assert_eq!(small.saturating_sub(small), Money::zero());
    }

    #[test]
    fn money_parsing() {
        assert_eq!("$10.50".parse::<Money>().unwrap().to_cents(), 1050);
        assert_eq!("25.99".parse::<Money>().unwrap().to_cents(), 2599);
        assert!("invalid".parse::<Money>().is_err());
        assert!("-5.00".parse::<Money>().is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Customer".parse::<Role>().unwrap(), Role::Customer);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn actor_capabilities() {
        let admin = Actor::new(UserId::try_new("admin-1").unwrap(), Role::Admin);
        let customer = Actor::new(UserId::try_new("cust-1").unwrap(), Role::Customer);

        assert!(admin.is_admin());
        assert!(!customer.is_admin());
        assert!(customer.owns(&UserId::try_new("cust-1").unwrap()));
        assert!(!customer.owns(&UserId::try_new("cust-2").unwrap()));
    }

    proptest! {
        #[test]
        fn prop_money_from_cents_roundtrip(cents in 0u64..1_000_000) {
            let money = Money::from_cents(cents).unwrap();
            prop_assert_eq!(money.to_cents(), cents);
        }

        #[test]
        fn prop_money_never_negative_after_saturating_sub(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let ma = Money::from_cents(a).unwrap();
            let mb = Money::from_cents(b).unwrap();
            let result = ma.saturating_sub(mb);
            prop_assert!(result.amount() >= rust_decimal::Decimal::ZERO);
            prop_assert_eq!(result.to_cents(), a.saturating_sub(b));
        }

        #[test]
        fn prop_quantity_roundtrip(value in 1u32..=1000) {
            let quantity = Quantity::new(value).unwrap();
            prop_assert_eq!(quantity.value(), value);
        }

        #[test]
        fn prop_unit_price_times_quantity(cents in 0u64..10_000, qty in 1u32..=100) {
            let price = Money::from_cents(cents).unwrap();
            let quantity = Quantity::new(qty).unwrap();
            let total = price.multiply_by_quantity(quantity).unwrap();
            prop_assert_eq!(total.to_cents(), cents * u64::from(qty));
        }
    }
}
