use rusqlite::Connection;
use std::path::Path;

pub fn open_db(db_path: &Path) -> anyhow::Result<Connection> {
    if let Some(dir) = db_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// In-memory store with the full schema; used by the integration tests.
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            first_name TEXT,
            last_name TEXT,
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            is_verified INTEGER NOT NULL DEFAULT 0,
            verification_code TEXT,
            verification_expiry TEXT,
            failed_attempts INTEGER NOT NULL DEFAULT 0,
            reset_token TEXT,
            reset_token_expiry TEXT,
            login_code TEXT UNIQUE,
            parent_id INTEGER,
            created_by INTEGER,
            creation_date TEXT,
            last_login TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_parent ON users(parent_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parent_student_relationships(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT,
            FOREIGN KEY(parent_id) REFERENCES users(user_id),
            FOREIGN KEY(student_id) REFERENCES users(user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_parent ON parent_student_relationships(parent_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_student ON parent_student_relationships(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_categories(
            category_id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT NOT NULL,
            category_code TEXT,
            display_order INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_name TEXT NOT NULL,
            category_id INTEGER,
            weight REAL NOT NULL DEFAULT 1.0,
            status TEXT NOT NULL DEFAULT 'active',
            FOREIGN KEY(category_id) REFERENCES subject_categories(category_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_category ON subjects(category_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_translations(
            subject_id INTEGER NOT NULL,
            language_id TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            PRIMARY KEY(subject_id, language_id),
            FOREIGN KEY(subject_id) REFERENCES subjects(subject_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_translations(
            category_id INTEGER NOT NULL,
            language_id TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY(category_id, language_id),
            FOREIGN KEY(category_id) REFERENCES subject_categories(category_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_systems(
            system_id INTEGER PRIMARY KEY AUTOINCREMENT,
            system_name TEXT NOT NULL,
            calculation_type TEXT,
            max_grade REAL,
            min_grade REAL,
            passing_grade REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_system_translations(
            system_id INTEGER NOT NULL,
            language_id TEXT NOT NULL,
            system_name TEXT NOT NULL,
            PRIMARY KEY(system_id, language_id),
            FOREIGN KEY(system_id) REFERENCES grade_systems(system_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_details(
            detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
            system_id INTEGER NOT NULL,
            grade_value REAL,
            grade_name TEXT,
            percentage_equivalent REAL,
            FOREIGN KEY(system_id) REFERENCES grade_systems(system_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_details_system ON grade_details(system_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS default_grades(
            grade_id INTEGER PRIMARY KEY AUTOINCREMENT,
            grade_name TEXT NOT NULL,
            grade_value REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS default_factors(
            factor_id INTEGER PRIMARY KEY AUTOINCREMENT,
            factor_name TEXT NOT NULL,
            factor_value REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_factors(
            class_id INTEGER PRIMARY KEY,
            factor_value REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_factors(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER NOT NULL,
            subject_id INTEGER,
            factor REAL,
            FOREIGN KEY(parent_id) REFERENCES users(user_id),
            FOREIGN KEY(subject_id) REFERENCES subjects(subject_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_factors_parent ON grade_factors(parent_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            test_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            school_year TEXT,
            term TEXT,
            total_score REAL,
            average_score REAL,
            bonus_points REAL,
            grade_system_id INTEGER,
            status TEXT,
            created_by INTEGER,
            created_at TEXT,
            FOREIGN KEY(student_id) REFERENCES users(user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_student ON tests(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_creator ON tests(created_by)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            grade_id INTEGER PRIMARY KEY AUTOINCREMENT,
            test_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            subject_id INTEGER,
            subject TEXT,
            grade REAL,
            grade_name TEXT,
            percentage_equivalent REAL,
            term_type TEXT,
            school_year TEXT,
            created_by INTEGER,
            created_at TEXT,
            FOREIGN KEY(test_id) REFERENCES tests(test_id),
            FOREIGN KEY(student_id) REFERENCES users(user_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_test ON grades(test_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_creator ON grades(created_by)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS translations(
            language_id TEXT NOT NULL,
            translation_key TEXT NOT NULL,
            translation_value TEXT NOT NULL,
            PRIMARY KEY(language_id, translation_key)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS languages(
            language_id TEXT PRIMARY KEY,
            language_name TEXT NOT NULL,
            country_code TEXT,
            display_order INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    Ok(())
}
