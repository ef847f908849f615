use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::AnyConnection;

use super::{decode_record, insert_err, BatchLoader, HotelHeader, Layout, LoadError, RowCounts};
use crate::hotelbeds::model::{content_of, HotelSummary};

pub const TABLE: &str = "hb_hotel_info";

const INSERT_HOTEL_INFO: &str = "INSERT INTO hb_hotel_info \
     (hotel_code, hotel_name, category_code, accommodation_type_code, email, website, last_update, s2c, ranking, \
      coordinates, city, facilities, rooms, images, phones, board_codes, address, hotel_details) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)";

/// One row per hotel; nested collections are kept as JSON text exactly as
/// they arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideLoader;

fn nested_or(record: &Value, key: &str, default: Value) -> Value {
    record.get(key).cloned().unwrap_or(default)
}

#[async_trait]
impl BatchLoader for WideLoader {
    fn layout(&self) -> Layout {
        Layout::Wide
    }

    async fn insert_record(
        &self,
        conn: &mut AnyConnection,
        index: usize,
        record: &Value,
        counts: &mut RowCounts,
    ) -> Result<(), LoadError> {
        let hotel: HotelSummary = decode_record(record, index)?;
        let header = HotelHeader::extract(&hotel, index, TABLE)?;
        let city = content_of(&hotel.city);
        let address = content_of(&hotel.address);

        let coordinates = nested_or(record, "coordinates", json!({}));
        let facilities = nested_or(record, "facilities", json!([]));
        let rooms = nested_or(record, "rooms", json!([]));
        let images = nested_or(record, "images", json!([]));
        let phones = nested_or(record, "phones", json!([]));
        let board_codes = nested_or(record, "boardCodes", json!([]));

        let details = json!({
            "name": header.name,
            "category_code": header.category_code,
            "accommodation_type_code": header.accommodation_type_code,
            "email": hotel.email,
            "website": hotel.web,
            "last_update": header.last_update,
            "S2C": hotel.s2c,
            "ranking": header.ranking,
            "coordinates": coordinates,
            "city": city,
            "facilities": facilities,
            "rooms": rooms,
            "images": images,
            "phones": phones,
            "board_codes": board_codes,
            "address": address,
        });

        let encode = |column: &'static str, value: &Value| {
            serde_json::to_string(value).map_err(|source| LoadError::Encode {
                index,
                table: TABLE,
                column,
                source,
            })
        };
        let coordinates_json = encode("coordinates", &coordinates)?;
        let facilities_json = encode("facilities", &facilities)?;
        let rooms_json = encode("rooms", &rooms)?;
        let images_json = encode("images", &images)?;
        let phones_json = encode("phones", &phones)?;
        let board_codes_json = encode("board_codes", &board_codes)?;
        let details_json = encode("hotel_details", &details)?;

        sqlx::query(INSERT_HOTEL_INFO)
            .bind(header.code)
            .bind(header.name)
            .bind(header.category_code)
            .bind(header.accommodation_type_code)
            .bind(hotel.email.as_deref())
            .bind(hotel.web.as_deref())
            .bind(header.last_update)
            .bind(hotel.s2c.as_deref())
            .bind(header.ranking)
            .bind(coordinates_json)
            .bind(city)
            .bind(facilities_json)
            .bind(rooms_json)
            .bind(images_json)
            .bind(phones_json)
            .bind(board_codes_json)
            .bind(address)
            .bind(details_json)
            .execute(&mut *conn)
            .await
            .map_err(insert_err(TABLE))?;
        counts.add(TABLE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_batch;
    use crate::loader::test_support::{count, sqlite_with};

    fn payload() -> Value {
        json!({"hotels": [
            {
                "code": "H1",
                "name": {"content": "Inn"},
                "categoryCode": "3EST",
                "accommodationTypeCode": "HTL",
                "lastUpdate": "2024-01-01",
                "ranking": 50,
                "city": {"content": "PALMA"},
                "rooms": [{"roomCode": "DBL", "roomStays": [{"stayType": "BED", "order": "1"}]}],
                "boardCodes": ["BB"]
            },
            {
                "code": "H2",
                "name": {"content": "Lodge"},
                "categoryCode": "2EST",
                "accommodationTypeCode": "APT",
                "lastUpdate": "2024-02-01",
                "ranking": 7
            }
        ]})
    }

    #[tokio::test]
    async fn one_row_per_hotel_with_json_blobs() {
        let mut db = sqlite_with(Layout::Wide).await;
        let counts = load_batch(&mut db.conn, &WideLoader, &payload()).await.unwrap();
        assert_eq!(counts.get(TABLE), 2);
        assert_eq!(count(&mut db.conn, TABLE).await, 2);

        let rooms: String =
            sqlx::query_scalar("SELECT rooms FROM hb_hotel_info WHERE hotel_code = 'H1'")
                .fetch_one(&mut db.conn)
                .await
                .unwrap();
        let rooms: Value = serde_json::from_str(&rooms).unwrap();
        assert_eq!(rooms[0]["roomStays"][0]["stayType"], "BED");

        let coords: String =
            sqlx::query_scalar("SELECT coordinates FROM hb_hotel_info WHERE hotel_code = 'H2'")
                .fetch_one(&mut db.conn)
                .await
                .unwrap();
        let facilities: String =
            sqlx::query_scalar("SELECT facilities FROM hb_hotel_info WHERE hotel_code = 'H2'")
                .fetch_one(&mut db.conn)
                .await
                .unwrap();
        assert_eq!(coords, "{}");
        assert_eq!(facilities, "[]");

        let details: String =
            sqlx::query_scalar("SELECT hotel_details FROM hb_hotel_info WHERE hotel_code = 'H1'")
                .fetch_one(&mut db.conn)
                .await
                .unwrap();
        let details: Value = serde_json::from_str(&details).unwrap();
        assert_eq!(details["city"], "PALMA");
        assert_eq!(details["board_codes"], json!(["BB"]));
        assert_eq!(details["address"], Value::Null);
    }

    #[tokio::test]
    async fn nested_values_are_stored_without_type_checks() {
        let mut db = sqlite_with(Layout::Wide).await;
        let mut p = payload();
        p["hotels"][1]["rooms"] = json!([{"roomCode": "DBL", "minPax": "1"}]);
        p["hotels"][1]["images"] = json!([{"path": "a.jpg", "order": "first"}]);

        let counts = load_batch(&mut db.conn, &WideLoader, &p).await.unwrap();
        assert_eq!(counts.get(TABLE), 2);

        let rooms: String =
            sqlx::query_scalar("SELECT rooms FROM hb_hotel_info WHERE hotel_code = 'H2'")
                .fetch_one(&mut db.conn)
                .await
                .unwrap();
        let rooms: Value = serde_json::from_str(&rooms).unwrap();
        assert_eq!(rooms, json!([{"roomCode": "DBL", "minPax": "1"}]));
    }

    #[tokio::test]
    async fn missing_mandatory_field_rolls_back() {
        let mut db = sqlite_with(Layout::Wide).await;
        let mut p = payload();
        p["hotels"][1]
            .as_object_mut()
            .unwrap()
            .remove("lastUpdate");

        let err = load_batch(&mut db.conn, &WideLoader, &p).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingField {
                index: 1,
                field: "lastUpdate",
                table: TABLE
            }
        ));
        assert_eq!(count(&mut db.conn, TABLE).await, 0);
    }
}
