use async_trait::async_trait;
use serde_json::Value;
use sqlx::AnyConnection;
use tracing::warn;

use super::{decode_record, insert_err, BatchLoader, HotelHeader, Layout, LoadError, RowCounts};
use crate::hotelbeds::model::{content_of, HotelRecord, Room, RoomStay};

pub const GENERAL_INFO: &str = "hb_hotel_general_info";
pub const COORDINATES: &str = "hb_location_coordinates";
pub const DESCRIPTION: &str = "hb_description";
pub const FACILITIES: &str = "hb_facilities";
pub const ROOMS: &str = "hb_rooms_type";
pub const ROOM_FEATURES: &str = "hb_room_features";
pub const ROOM_STAYS: &str = "hb_room_stays";
pub const STAY_FACILITIES: &str = "hb_room_stay_facilities";
pub const PHONES: &str = "hb_phone_numbers";
pub const BOARD_CODES: &str = "hb_board_codes";
pub const ADDRESS: &str = "hb_address";
pub const IMAGES: &str = "hb_images";

pub const TABLES: &[&str] = &[
    GENERAL_INFO,
    COORDINATES,
    DESCRIPTION,
    FACILITIES,
    ROOMS,
    ROOM_FEATURES,
    ROOM_STAYS,
    STAY_FACILITIES,
    PHONES,
    BOARD_CODES,
    ADDRESS,
    IMAGES,
];

const INSERT_GENERAL_INFO: &str = "INSERT INTO hb_hotel_general_info \
     (hotel_code, hotel_name, category_code, accommodation_type_code, email, website, last_update, s2c, ranking) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

const INSERT_COORDINATES: &str = "INSERT INTO hb_location_coordinates \
     (hotel_code, longitude, latitude, country_code, state_code, destination_code, zone_code, city) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_DESCRIPTION: &str =
    "INSERT INTO hb_description (hotel_code, description_text) VALUES ($1, $2)";

const INSERT_FACILITY: &str = "INSERT INTO hb_facilities \
     (hotel_code, facility_code, facility_group_code, number, voucher) \
     VALUES ($1, $2, $3, $4, $5)";

const INSERT_ROOM: &str = "INSERT INTO hb_rooms_type \
     (hotel_code, room_code, room_type, characteristic_code, min_pax, max_pax, min_adults, max_adults, max_children, is_parent_room) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id";

const INSERT_ROOM_FEATURE: &str = "INSERT INTO hb_room_features \
     (room_id, facility_code, facility_group_code, ind_logic, number, voucher) \
     VALUES ($1, $2, $3, $4, $5, $6)";

const INSERT_ROOM_STAY: &str = "INSERT INTO hb_room_stays \
     (room_id, stay_type, orderid, description) \
     VALUES ($1, $2, $3, $4) RETURNING id";

const INSERT_STAY_FACILITY: &str = "INSERT INTO hb_room_stay_facilities \
     (stay_id, facility_code, facility_group_code, number) \
     VALUES ($1, $2, $3, $4)";

const INSERT_PHONE: &str =
    "INSERT INTO hb_phone_numbers (hotel_code, phone_number, phone_type) VALUES ($1, $2, $3)";

const INSERT_BOARD_CODE: &str =
    "INSERT INTO hb_board_codes (hotel_code, board_code) VALUES ($1, $2)";

const INSERT_ADDRESS: &str =
    "INSERT INTO hb_address (hotel_code, address, city) VALUES ($1, $2, $3)";

const INSERT_IMAGE: &str = "INSERT INTO hb_images \
     (hotel_code, image_type_code, path, image_order, visual_order, room_code, room_type, characteristic_code) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

/// Writes each hotel into the general-info table and one dependent table per
/// nested collection. Rooms, stays and stay facilities are chained through
/// the ids generated for their parent rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLoader;

#[async_trait]
impl BatchLoader for NormalizedLoader {
    fn layout(&self) -> Layout {
        Layout::Normalized
    }

    async fn insert_record(
        &self,
        conn: &mut AnyConnection,
        index: usize,
        record: &Value,
        counts: &mut RowCounts,
    ) -> Result<(), LoadError> {
        let hotel: HotelRecord = decode_record(record, index)?;
        let header = HotelHeader::extract(&hotel.summary, index, GENERAL_INFO)?;
        let code = header.code;

        sqlx::query(INSERT_GENERAL_INFO)
            .bind(code)
            .bind(header.name)
            .bind(header.category_code)
            .bind(header.accommodation_type_code)
            .bind(hotel.summary.email.as_deref())
            .bind(hotel.summary.web.as_deref())
            .bind(header.last_update)
            .bind(hotel.summary.s2c.as_deref())
            .bind(header.ranking)
            .execute(&mut *conn)
            .await
            .map_err(insert_err(GENERAL_INFO))?;
        counts.add(GENERAL_INFO);

        if let Some(coords) = &hotel.coordinates {
            sqlx::query(INSERT_COORDINATES)
                .bind(code)
                .bind(coords.longitude)
                .bind(coords.latitude)
                .bind(hotel.country_code.as_deref())
                .bind(hotel.state_code.as_deref())
                .bind(hotel.destination_code.as_deref())
                .bind(hotel.zone_code.as_deref())
                .bind(content_of(&hotel.summary.city))
                .execute(&mut *conn)
                .await
                .map_err(insert_err(COORDINATES))?;
            counts.add(COORDINATES);
        }

        if hotel.description.is_some() {
            sqlx::query(INSERT_DESCRIPTION)
                .bind(code)
                .bind(content_of(&hotel.description).unwrap_or(""))
                .execute(&mut *conn)
                .await
                .map_err(insert_err(DESCRIPTION))?;
            counts.add(DESCRIPTION);
        }

        for facility in hotel.facilities.iter().flatten() {
            sqlx::query(INSERT_FACILITY)
                .bind(code)
                .bind(facility.facility_code)
                .bind(facility.facility_group_code)
                .bind(facility.number.unwrap_or(0))
                .bind(facility.voucher.unwrap_or(false))
                .execute(&mut *conn)
                .await
                .map_err(insert_err(FACILITIES))?;
            counts.add(FACILITIES);
        }

        for (room_index, room) in hotel.rooms.iter().flatten().enumerate() {
            let Some(room_code) = room.room_code.as_deref().filter(|c| !c.is_empty()) else {
                warn!(
                    hotel_code = code,
                    record = index,
                    room = room_index,
                    room_type = room.room_type.as_deref().unwrap_or("-"),
                    "missing room_code; skipping room"
                );
                continue;
            };
            insert_room(conn, code, room_code, room, counts).await?;
        }

        for phone in hotel.phones.iter().flatten() {
            sqlx::query(INSERT_PHONE)
                .bind(code)
                .bind(phone.phone_number.as_deref())
                .bind(phone.phone_type.as_deref())
                .execute(&mut *conn)
                .await
                .map_err(insert_err(PHONES))?;
            counts.add(PHONES);
        }

        for board_code in hotel.board_codes.iter().flatten() {
            sqlx::query(INSERT_BOARD_CODE)
                .bind(code)
                .bind(board_code.as_str())
                .execute(&mut *conn)
                .await
                .map_err(insert_err(BOARD_CODES))?;
            counts.add(BOARD_CODES);
        }

        if hotel.summary.address.is_some() {
            insert_address(conn, code, &hotel).await?;
            counts.add(ADDRESS);
        }

        for image in hotel.images.iter().flatten() {
            sqlx::query(INSERT_IMAGE)
                .bind(code)
                .bind(image.image_type_code.as_deref())
                .bind(image.path.as_deref())
                .bind(image.order)
                .bind(image.visual_order)
                .bind(image.room_code.as_deref())
                .bind(image.room_type.as_deref())
                .bind(image.characteristic_code.as_deref())
                .execute(&mut *conn)
                .await
                .map_err(insert_err(IMAGES))?;
            counts.add(IMAGES);
        }

        Ok(())
    }
}

async fn insert_address(
    conn: &mut AnyConnection,
    code: &str,
    hotel: &HotelRecord,
) -> Result<(), LoadError> {
    sqlx::query(INSERT_ADDRESS)
        .bind(code)
        .bind(content_of(&hotel.summary.address))
        .bind(content_of(&hotel.summary.city))
        .execute(&mut *conn)
        .await
        .map_err(insert_err(ADDRESS))?;
    Ok(())
}

async fn insert_room(
    conn: &mut AnyConnection,
    hotel_code: &str,
    room_code: &str,
    room: &Room,
    counts: &mut RowCounts,
) -> Result<(), LoadError> {
    let room_id: i64 = sqlx::query_scalar(INSERT_ROOM)
        .bind(hotel_code)
        .bind(room_code)
        .bind(room.room_type.as_deref())
        .bind(room.characteristic_code.as_deref())
        .bind(room.min_pax)
        .bind(room.max_pax)
        .bind(room.min_adults)
        .bind(room.max_adults)
        .bind(room.max_children)
        .bind(room.is_parent_room)
        .fetch_one(&mut *conn)
        .await
        .map_err(insert_err(ROOMS))?;
    counts.add(ROOMS);

    for feature in room.room_facilities.iter().flatten() {
        sqlx::query(INSERT_ROOM_FEATURE)
            .bind(room_id)
            .bind(feature.facility_code)
            .bind(feature.facility_group_code)
            .bind(feature.ind_logic)
            .bind(feature.number)
            .bind(feature.voucher)
            .execute(&mut *conn)
            .await
            .map_err(insert_err(ROOM_FEATURES))?;
        counts.add(ROOM_FEATURES);
    }

    for stay in room.room_stays.iter().flatten() {
        insert_stay(conn, room_id, stay, counts).await?;
    }
    Ok(())
}

async fn insert_stay(
    conn: &mut AnyConnection,
    room_id: i64,
    stay: &RoomStay,
    counts: &mut RowCounts,
) -> Result<(), LoadError> {
    let stay_id: i64 = sqlx::query_scalar(INSERT_ROOM_STAY)
        .bind(room_id)
        .bind(stay.stay_type.as_deref())
        .bind(stay.order.as_deref())
        .bind(stay.description.as_deref())
        .fetch_one(&mut *conn)
        .await
        .map_err(insert_err(ROOM_STAYS))?;
    counts.add(ROOM_STAYS);

    for facility in stay.room_stay_facilities.iter().flatten() {
        sqlx::query(INSERT_STAY_FACILITY)
            .bind(stay_id)
            .bind(facility.facility_code)
            .bind(facility.facility_group_code)
            .bind(facility.number)
            .execute(&mut *conn)
            .await
            .map_err(insert_err(STAY_FACILITIES))?;
        counts.add(STAY_FACILITIES);
    }
    Ok(())
}
