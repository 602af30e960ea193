//! Database schema definitions

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Fill-level trade activity for the analyzed wallet.
-- One row per (transaction, token). activity_type distinguishes real
-- fills from maker-rebate credits.
CREATE TABLE IF NOT EXISTS trades (
    transaction_hash TEXT NOT NULL,
    asset TEXT NOT NULL,
    side TEXT NOT NULL,
    outcome TEXT NOT NULL,
    size REAL NOT NULL,
    price REAL NOT NULL,
    usdc_value REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    condition_id TEXT NOT NULL,
    fee REAL NOT NULL DEFAULT 0.0,
    activity_type TEXT NOT NULL DEFAULT 'TRADE',
    PRIMARY KEY (transaction_hash, asset)
);

CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp);
CREATE INDEX IF NOT EXISTS idx_trades_condition_id ON trades(condition_id);
CREATE INDEX IF NOT EXISTS idx_trades_activity_type ON trades(activity_type);

-- Market metadata from the exchange catalog
CREATE TABLE IF NOT EXISTS markets (
    condition_id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    slug TEXT NOT NULL DEFAULT '',
    end_ts INTEGER NOT NULL DEFAULT 0,
    volume REAL NOT NULL DEFAULT 0.0,
    liquidity REAL NOT NULL DEFAULT 0.0,
    neg_risk INTEGER NOT NULL DEFAULT 0
);

-- Position ground truth (one row per token held)
CREATE TABLE IF NOT EXISTS positions (
    asset TEXT PRIMARY KEY,
    condition_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    total_bought REAL NOT NULL DEFAULT 0.0,
    avg_price REAL NOT NULL DEFAULT 0.0,
    realized_pnl REAL NOT NULL DEFAULT 0.0,
    cur_price REAL NOT NULL DEFAULT 0.0,
    close_timestamp INTEGER NOT NULL DEFAULT 0,
    is_closed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_positions_condition_id ON positions(condition_id);

-- On-chain OrderFilled events matched to the wallet (optional dataset)
CREATE TABLE IF NOT EXISTS onchain_fills (
    transaction_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    condition_id TEXT,
    counterparty TEXT,
    bot_role TEXT NOT NULL,
    side TEXT,
    usdc_value REAL NOT NULL DEFAULT 0.0,
    fee REAL NOT NULL DEFAULT 0.0,
    timestamp INTEGER NOT NULL,
    PRIMARY KEY (transaction_hash, log_index)
);

CREATE INDEX IF NOT EXISTS idx_onchain_counterparty ON onchain_fills(counterparty);
CREATE INDEX IF NOT EXISTS idx_onchain_condition_id ON onchain_fills(condition_id)
"#;

/// ALTER TABLE migrations applied after table creation.
/// "duplicate column name" errors are tolerated on re-run.
pub const MIGRATIONS: &[&str] = &[];
