//! Static registry of prunable tables.
//!
//! Each entity maps to the column holding its timestamp, how that column is
//! stored, and whether it carries an `account` column. `CATALOG` fixes the deletion order so every
//! run walks the tables the same way. Adding a prunable table means adding a
//! variant, a descriptor, and a slot in `CATALOG`.

/// A prunable table of exchange records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Orders,
    DailyBalance,
    Balance,
    AssetBalance,
    Position,
    CurrentPrice,
    Income,
    Trade,
    TradedSymbol,
    SymbolCheck,
}

/// Storage form of a time column. Bounds are rendered in the same form so
/// text comparison orders them correctly against stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    /// `YYYY-MM-DD`
    Date,
    /// `YYYY-MM-DD HH:MM:SS.ffffff`
    DateTime,
}

/// How a table exposes time and account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub entity: Entity,
    pub table: &'static str,
    pub time_column: &'static str,
    pub time_kind: TimeKind,
    pub has_account_column: bool,
}

/// Deletion order.
pub const CATALOG: &[Entity] = &[
    Entity::Orders,
    Entity::DailyBalance,
    Entity::Balance,
    Entity::AssetBalance,
    Entity::Position,
    Entity::CurrentPrice,
    Entity::Income,
    Entity::Trade,
    Entity::TradedSymbol,
    Entity::SymbolCheck,
];

/// The entity whose distinct `account` values define the known accounts.
pub const ACCOUNT_REGISTRY: Entity = Entity::Balance;

const fn descriptor(
    entity: Entity,
    table: &'static str,
    time_column: &'static str,
    time_kind: TimeKind,
) -> EntityDescriptor {
    EntityDescriptor {
        entity,
        table,
        time_column,
        time_kind,
        has_account_column: true,
    }
}

use TimeKind::{Date, DateTime};

const ORDERS: EntityDescriptor =
    descriptor(Entity::Orders, "orders", "registration_datetime", DateTime);
const DAILY_BALANCE: EntityDescriptor =
    descriptor(Entity::DailyBalance, "daily_balance", "day", Date);
const BALANCE: EntityDescriptor =
    descriptor(Entity::Balance, "balance", "registration_datetime", DateTime);
const ASSET_BALANCE: EntityDescriptor =
    descriptor(Entity::AssetBalance, "asset_balance", "registration_datetime", DateTime);
const POSITION: EntityDescriptor =
    descriptor(Entity::Position, "position", "registration_datetime", DateTime);
const CURRENT_PRICE: EntityDescriptor =
    descriptor(Entity::CurrentPrice, "current_price", "registration_datetime", DateTime);
const INCOME: EntityDescriptor = descriptor(Entity::Income, "income", "time", DateTime);
const TRADE: EntityDescriptor = descriptor(Entity::Trade, "trade", "time", DateTime);
const TRADED_SYMBOL: EntityDescriptor =
    descriptor(Entity::TradedSymbol, "traded_symbol", "registration_datetime", DateTime);
const SYMBOL_CHECK: EntityDescriptor =
    descriptor(Entity::SymbolCheck, "symbol_check", "registration_datetime", DateTime);

/// Look up the descriptor for an entity.
pub fn describe(entity: Entity) -> &'static EntityDescriptor {
    match entity {
        Entity::Orders => &ORDERS,
        Entity::DailyBalance => &DAILY_BALANCE,
        Entity::Balance => &BALANCE,
        Entity::AssetBalance => &ASSET_BALANCE,
        Entity::Position => &POSITION,
        Entity::CurrentPrice => &CURRENT_PRICE,
        Entity::Income => &INCOME,
        Entity::Trade => &TRADE,
        Entity::TradedSymbol => &TRADED_SYMBOL,
        Entity::SymbolCheck => &SYMBOL_CHECK,
    }
}

/// Descriptors in deletion order.
pub fn descriptors() -> impl Iterator<Item = &'static EntityDescriptor> {
    CATALOG.iter().map(|e| describe(*e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_covers_every_entity_once() {
        let unique: HashSet<Entity> = CATALOG.iter().copied().collect();
        assert_eq!(unique.len(), CATALOG.len());
        assert_eq!(CATALOG.len(), 10);
    }

    #[test]
    fn test_descriptor_matches_entity() {
        for entity in CATALOG {
            assert_eq!(describe(*entity).entity, *entity);
        }
    }

    #[test]
    fn test_time_columns() {
        assert_eq!(describe(Entity::DailyBalance).time_column, "day");
        assert_eq!(describe(Entity::Income).time_column, "time");
        assert_eq!(describe(Entity::Trade).time_column, "time");
        assert_eq!(describe(Entity::Orders).time_column, "registration_datetime");
    }

    #[test]
    fn test_only_day_column_is_a_date() {
        for d in descriptors() {
            let expected = if d.time_column == "day" {
                TimeKind::Date
            } else {
                TimeKind::DateTime
            };
            assert_eq!(d.time_kind, expected, "{}", d.table);
        }
    }

    #[test]
    fn test_order_starts_with_orders() {
        let tables: Vec<&str> = descriptors().map(|d| d.table).collect();
        assert_eq!(tables.first(), Some(&"orders"));
        assert_eq!(tables.last(), Some(&"symbol_check"));
    }

    #[test]
    fn test_account_registry_has_account_column() {
        assert!(describe(ACCOUNT_REGISTRY).has_account_column);
    }
}
