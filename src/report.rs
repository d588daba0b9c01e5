use sqlx::types::Decimal;
use sqlx::{Connection, PgConnection};
use time::{Date, OffsetDateTime, Time};

use crate::configuration::DatabaseSettings;

/// Result columns of the ticketing report, in output order. The header row of
/// the exported workbook is exactly this list.
pub const COLUMNS: [&str; 25] = [
    "ticket_ref",
    "ticket_status",
    "ticket_price",
    "ticket_currency",
    "issued_at",
    "booking_ref",
    "booking_status",
    "booking_total_amount",
    "booking_currency",
    "paid_amount",
    "latest_payment_status",
    "passenger_first_name",
    "passenger_last_name",
    "passenger_doc_type",
    "service_date",
    "departure_time",
    "arrival_time",
    "departure_station_code",
    "arrival_station_code",
    "route_code",
    "fare_code",
    "fare_seat_class",
    "seat_number",
    "carriage_number",
    "train_registration",
];

// Bookings, passengers, fares and seats are optional on a ticket, and a trip
// may have no train assigned, hence the left joins. Payments are folded into
// one row per booking before joining. Ordering comes from the database and is
// stable because ticket_ref is unique.
const REPORT_SQL: &str = r"
WITH payment_summary AS (
    SELECT booking_id,
           SUM(amount) AS paid_amount,
           MAX(status) AS latest_payment_status
    FROM payments
    GROUP BY booking_id
)
SELECT
    t.ticket_ref,
    t.status AS ticket_status,
    t.price AS ticket_price,
    t.currency AS ticket_currency,
    t.issued_at,
    b.booking_ref,
    b.status AS booking_status,
    b.total_amount AS booking_total_amount,
    b.currency AS booking_currency,
    pay.paid_amount,
    pay.latest_payment_status,
    p.first_name AS passenger_first_name,
    p.last_name AS passenger_last_name,
    p.doc_type::text AS passenger_doc_type,
    trip.service_date,
    trip.departure_time,
    trip.arrival_time,
    dep.code AS departure_station_code,
    arr.code AS arrival_station_code,
    route.code AS route_code,
    fare.code AS fare_code,
    fare.seat_class::text AS fare_seat_class,
    seat.seat_number,
    carriage.carriage_number,
    train.registration AS train_registration
FROM tickets t
JOIN trips trip ON trip.id = t.trip_id
JOIN routes route ON route.id = trip.route_id
JOIN stations dep ON dep.id = trip.departure_station_id
JOIN stations arr ON arr.id = trip.arrival_station_id
LEFT JOIN bookings b ON b.id = t.booking_id
LEFT JOIN passengers p ON p.id = t.passenger_id
LEFT JOIN fares fare ON fare.id = t.fare_id
LEFT JOIN seats seat ON seat.id = t.seat_id
LEFT JOIN carriages carriage ON carriage.id = seat.carriage_id
LEFT JOIN trains train ON train.id = trip.train_id
LEFT JOIN payment_summary pay ON pay.booking_id = b.id
WHERE t.issued_at::date BETWEEN $1 AND $2
ORDER BY trip.service_date, trip.departure_time, t.ticket_ref
";

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("start date {start} cannot be after end date {end}")]
    StartAfterEnd { start: Date, end: Date },

    #[error("failed to connect to the ticketing database")]
    Connection(#[source] sqlx::Error),

    #[error("failed to run the ticketing report query")]
    Query(#[source] sqlx::Error),
}

/// Inclusive calendar date range, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    /// # Errors
    ///
    /// Will return `ReportError::StartAfterEnd` when `start > end`
    pub fn new(start: Date, end: Date) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::StartAfterEnd { start, end });
        }

        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> Date {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> Date {
        self.end
    }
}

/// One row of the ticketing report. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReportRow {
    pub ticket_ref: String,
    pub ticket_status: String,
    pub ticket_price: Decimal,
    pub ticket_currency: String,
    pub issued_at: OffsetDateTime,
    pub booking_ref: Option<String>,
    pub booking_status: Option<String>,
    pub booking_total_amount: Option<Decimal>,
    pub booking_currency: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub latest_payment_status: Option<String>,
    pub passenger_first_name: Option<String>,
    pub passenger_last_name: Option<String>,
    pub passenger_doc_type: Option<String>,
    pub service_date: Date,
    pub departure_time: Time,
    pub arrival_time: Time,
    pub departure_station_code: String,
    pub arrival_station_code: String,
    pub route_code: String,
    pub fare_code: Option<String>,
    pub fare_seat_class: Option<String>,
    pub seat_number: Option<String>,
    pub carriage_number: Option<i32>,
    pub train_registration: Option<String>,
}

/// Scalar value of a single report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Amount(Decimal),
    Integer(i64),
    Date(Date),
    Time(Time),
    Timestamp(OffsetDateTime),
    Null,
}

impl ReportRow {
    /// Cell values in [`COLUMNS`] order.
    #[must_use]
    pub fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.ticket_ref.clone()),
            CellValue::Text(self.ticket_status.clone()),
            CellValue::Amount(self.ticket_price),
            CellValue::Text(self.ticket_currency.clone()),
            CellValue::Timestamp(self.issued_at),
            text_or_null(self.booking_ref.as_ref()),
            text_or_null(self.booking_status.as_ref()),
            amount_or_null(self.booking_total_amount),
            text_or_null(self.booking_currency.as_ref()),
            amount_or_null(self.paid_amount),
            text_or_null(self.latest_payment_status.as_ref()),
            text_or_null(self.passenger_first_name.as_ref()),
            text_or_null(self.passenger_last_name.as_ref()),
            text_or_null(self.passenger_doc_type.as_ref()),
            CellValue::Date(self.service_date),
            CellValue::Time(self.departure_time),
            CellValue::Time(self.arrival_time),
            CellValue::Text(self.departure_station_code.clone()),
            CellValue::Text(self.arrival_station_code.clone()),
            CellValue::Text(self.route_code.clone()),
            text_or_null(self.fare_code.as_ref()),
            text_or_null(self.fare_seat_class.as_ref()),
            text_or_null(self.seat_number.as_ref()),
            self.carriage_number
                .map_or(CellValue::Null, |number| CellValue::Integer(i64::from(number))),
            text_or_null(self.train_registration.as_ref()),
        ]
    }
}

fn text_or_null(value: Option<&String>) -> CellValue {
    value.map_or(CellValue::Null, |text| CellValue::Text(text.clone()))
}

fn amount_or_null(value: Option<Decimal>) -> CellValue {
    value.map_or(CellValue::Null, CellValue::Amount)
}

pub struct TicketingReport {
    pub rows: Vec<ReportRow>,
}

impl TicketingReport {
    #[must_use]
    pub fn columns() -> &'static [&'static str] {
        &COLUMNS
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Run the report query for the inclusive `[start_date, end_date]` range,
/// matched against each ticket's issuance date.
///
/// Opens a single scoped connection; the range is validated before any
/// connection is attempted.
///
/// # Errors
///
/// Will return `ReportError` when the range is invalid, the connection cannot
/// be opened, or the query fails
#[tracing::instrument(name = "fetch ticketing report from database", skip(settings))]
pub async fn fetch_ticket_report(
    settings: &DatabaseSettings,
    start_date: Date,
    end_date: Date,
) -> Result<TicketingReport, ReportError> {
    let range = DateRange::new(start_date, end_date)?;

    let mut connection = PgConnection::connect_with(&settings.with_db())
        .await
        .map_err(ReportError::Connection)?;

    let rows = sqlx::query_as::<_, ReportRow>(REPORT_SQL)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&mut connection)
        .await
        .map_err(ReportError::Query)?;

    connection.close().await.map_err(ReportError::Connection)?;

    tracing::info!(row_count = rows.len(), "fetched ticketing report rows");

    Ok(TicketingReport { rows })
}
