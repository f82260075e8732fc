pub const CREATE_TABLES: &str = "
    PRAGMA journal_mode=WAL;

    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";
