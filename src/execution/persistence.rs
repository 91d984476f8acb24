use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use crate::execution::types::{Fill, Instruction};
use crate::monitoring::{DailyRecord, RecordSink};

/// SQLite store for a run's daily records, instructions and fills.
pub struct RunDatabase {
    conn: Connection,
}

impl RunDatabase {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS daily_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                day TEXT NOT NULL,
                num_long INTEGER NOT NULL,
                num_short INTEGER NOT NULL,
                leverage REAL NOT NULL,
                portfolio_value REAL NOT NULL,
                recorded_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS instructions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                day TEXT NOT NULL,
                asset TEXT NOT NULL,
                target_weight REAL NOT NULL,
                leg TEXT NOT NULL,
                status TEXT NOT NULL,
                logged_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                day TEXT NOT NULL,
                asset TEXT NOT NULL,
                shares REAL NOT NULL,
                price REAL NOT NULL,
                commission REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_daily_records_day ON daily_records(day);
            CREATE INDEX IF NOT EXISTS idx_instructions_day ON instructions(day);
            CREATE INDEX IF NOT EXISTS idx_fills_day ON fills(day);
            "#,
        )?;

        Ok(Self { conn })
    }

    pub fn insert_record(&self, day: NaiveDate, record: &DailyRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO daily_records (day, num_long, num_short, leverage, portfolio_value, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                day.to_string(),
                record.num_long as i64,
                record.num_short as i64,
                record.leverage,
                record.portfolio_value,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Journal one day's instructions and fills in a single transaction, so a
    /// failed write leaves neither behind.
    pub fn log_rebalance(&self, instructions: &[Instruction], fills: &[Fill]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        insert_instructions(&tx, instructions)?;
        insert_fills(&tx, fills)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_record(&self, day: NaiveDate) -> Result<Option<DailyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT num_long, num_short, leverage, portfolio_value
             FROM daily_records
             WHERE day = ?1
             ORDER BY id DESC
             LIMIT 1",
        )?;

        let mut rows = stmt.query_map(params![day.to_string()], |row| {
            let num_long: i64 = row.get(0)?;
            let num_short: i64 = row.get(1)?;
            Ok(DailyRecord {
                num_long: num_long as usize,
                num_short: num_short as usize,
                leverage: row.get(2)?,
                portfolio_value: row.get(3)?,
            })
        })?;

        let record = rows.next().transpose()?;
        Ok(record)
    }

    pub fn count_records(&self) -> Result<usize> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_records",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn insert_instructions(conn: &Connection, instructions: &[Instruction]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO instructions (day, asset, target_weight, leg, status, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let now = Utc::now().to_rfc3339();

    for ins in instructions {
        stmt.execute(params![
            ins.day.to_string(),
            ins.asset.symbol(),
            ins.weight,
            ins.leg.to_string(),
            ins.status.as_str(),
            now,
        ])?;
    }
    Ok(())
}

fn insert_fills(conn: &Connection, fills: &[Fill]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO fills (day, asset, shares, price, commission)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for fill in fills {
        stmt.execute(params![
            fill.day.to_string(),
            fill.asset.symbol(),
            fill.shares,
            fill.price,
            fill.commission,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
impl RunDatabase {
    pub(crate) fn count_instructions(&self, day: NaiveDate, status: &str) -> Result<usize> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM instructions WHERE day = ?1 AND status = ?2",
            params![day.to_string(), status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl RecordSink for RunDatabase {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn record(&mut self, day: NaiveDate, record: &DailyRecord) -> Result<()> {
        self.insert_record(day, record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Asset;
    use crate::execution::types::InstructionStatus;
    use crate::strategies::types::Leg;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    fn instruction(symbol: &str, status: InstructionStatus) -> Instruction {
        Instruction {
            day: day(),
            asset: Asset::new(symbol),
            weight: 0.5,
            leg: Leg::Long,
            status,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let mut db = RunDatabase::new(":memory:").unwrap();
        let record = DailyRecord {
            num_long: 2,
            num_short: 1,
            leverage: 1.5,
            portfolio_value: 10_000.0,
        };

        db.record(day(), &record).unwrap();

        assert_eq!(db.count_records().unwrap(), 1);
        assert_eq!(db.get_record(day()).unwrap(), Some(record));
        assert_eq!(db.get_record(day().succ_opt().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_instruction_status_counts() {
        let db = RunDatabase::new(":memory:").unwrap();

        db.log_rebalance(
            &[
                instruction("A", InstructionStatus::Submitted),
                instruction("B", InstructionStatus::SkippedUntradable),
                instruction("C", InstructionStatus::Submitted),
            ],
            &[],
        )
        .unwrap();

        assert_eq!(db.count_instructions(day(), "submitted").unwrap(), 2);
        assert_eq!(db.count_instructions(day(), "skipped_untradable").unwrap(), 1);
    }

    #[test]
    fn test_failed_fill_write_rolls_back_instructions() {
        let db = RunDatabase::new(":memory:").unwrap();
        db.conn.execute_batch("DROP TABLE fills").unwrap();
        let fill = Fill {
            day: day(),
            asset: Asset::new("A"),
            shares: 10.0,
            price: 100.0,
            commission: 0.0,
        };

        let result = db.log_rebalance(&[instruction("A", InstructionStatus::Submitted)], &[fill]);

        assert!(result.is_err());
        assert_eq!(db.count_instructions(day(), "submitted").unwrap(), 0);
    }
}
