//! The built-in GTFS table set.
//!
//! Covers the static GTFS reference tables plus the GTFS-Flex additions
//! (areas, booking rules, locations, location groups). Only declared columns
//! are carried through a merge; archive entries outside this set are not
//! merged.

use crate::field::Field;
use crate::table::{Schema, TableDescriptor};

const AGENCY: &[Field] = &[
    Field::optional("agency_id"),
    Field::required("agency_name"),
    Field::required("agency_url"),
    Field::required("agency_timezone"),
    Field::optional("agency_lang"),
    Field::optional("agency_phone"),
    Field::optional("agency_fare_url"),
    Field::optional("agency_email"),
];

const CALENDAR: &[Field] = &[
    Field::required("service_id"),
    Field::required("monday"),
    Field::required("tuesday"),
    Field::required("wednesday"),
    Field::required("thursday"),
    Field::required("friday"),
    Field::required("saturday"),
    Field::required("sunday"),
    Field::required("start_date"),
    Field::required("end_date"),
];

const CALENDAR_DATES: &[Field] = &[
    Field::required("service_id"),
    Field::required("date"),
    Field::required("exception_type"),
];

const BOOKING_RULES: &[Field] = &[
    Field::required("booking_rule_id"),
    Field::required("booking_type"),
    Field::optional("prior_notice_duration_min"),
    Field::optional("prior_notice_duration_max"),
    Field::optional("prior_notice_last_day"),
    Field::optional("prior_notice_last_time"),
    Field::optional("prior_notice_start_day"),
    Field::optional("prior_notice_start_time"),
    Field::optional("prior_notice_service_id").references_service(),
    Field::optional("message"),
    Field::optional("pickup_message"),
    Field::optional("drop_off_message"),
    Field::optional("phone_number"),
    Field::optional("info_url"),
    Field::optional("booking_url"),
];

const FARE_ATTRIBUTES: &[Field] = &[
    Field::required("fare_id"),
    Field::required("price"),
    Field::required("currency_type"),
    Field::required("payment_method"),
    Field::optional("transfers"),
    Field::optional("agency_id").references("agency", "agency_id"),
    Field::optional("transfer_duration"),
];

const FEED_INFO: &[Field] = &[
    Field::required("feed_publisher_name"),
    Field::required("feed_publisher_url"),
    Field::required("feed_lang"),
    Field::optional("default_lang"),
    Field::optional("feed_start_date"),
    Field::optional("feed_end_date"),
    Field::optional("feed_version"),
    Field::optional("feed_contact_email"),
    Field::optional("feed_contact_url"),
];

const ROUTES: &[Field] = &[
    Field::required("route_id"),
    Field::optional("agency_id").references("agency", "agency_id"),
    Field::optional("route_short_name"),
    Field::optional("route_long_name"),
    Field::optional("route_desc"),
    Field::required("route_type"),
    Field::optional("route_url"),
    Field::optional("route_color"),
    Field::optional("route_text_color"),
    Field::optional("route_sort_order"),
    Field::optional("continuous_pickup"),
    Field::optional("continuous_drop_off"),
];

const SHAPES: &[Field] = &[
    Field::required("shape_id"),
    Field::required("shape_pt_lat"),
    Field::required("shape_pt_lon"),
    Field::required("shape_pt_sequence"),
    Field::optional("shape_dist_traveled"),
];

const LEVELS: &[Field] = &[
    Field::required("level_id"),
    Field::required("level_index"),
    Field::optional("level_name"),
];

const STOPS: &[Field] = &[
    Field::required("stop_id"),
    Field::optional("stop_code"),
    Field::optional("stop_name"),
    Field::optional("stop_desc"),
    Field::optional("stop_lat"),
    Field::optional("stop_lon"),
    Field::optional("zone_id"),
    Field::optional("stop_url"),
    Field::optional("location_type"),
    Field::optional("parent_station").references("stops", "stop_id"),
    Field::optional("stop_timezone"),
    Field::optional("wheelchair_boarding"),
    Field::optional("level_id").references("levels", "level_id"),
    Field::optional("platform_code"),
];

const PATHWAYS: &[Field] = &[
    Field::required("pathway_id"),
    Field::required("from_stop_id").references("stops", "stop_id"),
    Field::required("to_stop_id").references("stops", "stop_id"),
    Field::required("pathway_mode"),
    Field::required("is_bidirectional"),
    Field::optional("length"),
    Field::optional("traversal_time"),
    Field::optional("stair_count"),
    Field::optional("max_slope"),
    Field::optional("min_width"),
    Field::optional("signposted_as"),
    Field::optional("reversed_signposted_as"),
];

const AREAS: &[Field] = &[Field::required("area_id"), Field::optional("area_name")];

const STOP_AREAS: &[Field] = &[
    Field::required("area_id").references("areas", "area_id"),
    Field::required("stop_id").references("stops", "stop_id"),
];

const LOCATIONS: &[Field] = &[
    Field::required("location_id"),
    Field::optional("stop_name"),
    Field::optional("stop_desc"),
    Field::optional("zone_id"),
    Field::optional("stop_url"),
    Field::optional("geometry_type"),
];

const LOCATION_SHAPES: &[Field] = &[
    Field::required("location_id").references("locations", "location_id"),
    Field::optional("geometry_id"),
    Field::required("geometry_pt_lat"),
    Field::required("geometry_pt_lon"),
];

const LOCATION_GROUPS: &[Field] = &[
    Field::required("location_group_id"),
    Field::optional("location_group_name"),
];

const LOCATION_GROUP_STOPS: &[Field] = &[
    Field::required("location_group_id").references("location_groups", "location_group_id"),
    Field::required("stop_id").references_any(&[
        ("stops", "stop_id"),
        ("locations", "location_id"),
    ]),
];

const FARE_RULES: &[Field] = &[
    Field::required("fare_id").references("fare_attributes", "fare_id"),
    Field::optional("route_id").references("routes", "route_id"),
    Field::optional("origin_id"),
    Field::optional("destination_id"),
    Field::optional("contains_id"),
];

const TRANSFERS: &[Field] = &[
    Field::required("from_stop_id").references("stops", "stop_id"),
    Field::required("to_stop_id").references("stops", "stop_id"),
    Field::required("transfer_type"),
    Field::optional("min_transfer_time"),
];

const TRIPS: &[Field] = &[
    Field::required("route_id").references("routes", "route_id"),
    Field::required("service_id").references_service(),
    Field::required("trip_id"),
    Field::optional("trip_headsign"),
    Field::optional("trip_short_name"),
    Field::optional("direction_id"),
    Field::optional("block_id"),
    Field::optional("shape_id").references("shapes", "shape_id"),
    Field::optional("wheelchair_accessible"),
    Field::optional("bikes_allowed"),
];

const STOP_TIMES: &[Field] = &[
    Field::required("trip_id").references("trips", "trip_id"),
    Field::optional("arrival_time"),
    Field::optional("departure_time"),
    Field::required("stop_id").references_any(&[
        ("stops", "stop_id"),
        ("locations", "location_id"),
        ("location_group_stops", "location_group_id"),
    ]),
    Field::required("stop_sequence"),
    Field::optional("stop_headsign"),
    Field::optional("start_pickup_drop_off_window"),
    Field::optional("end_pickup_drop_off_window"),
    Field::optional("pickup_type"),
    Field::optional("drop_off_type"),
    Field::optional("continuous_pickup"),
    Field::optional("continuous_drop_off"),
    Field::optional("shape_dist_traveled"),
    Field::optional("timepoint"),
    Field::optional("pickup_booking_rule_id").references("booking_rules", "booking_rule_id"),
    Field::optional("drop_off_booking_rule_id").references("booking_rules", "booking_rule_id"),
    Field::optional("mean_duration_factor"),
    Field::optional("mean_duration_offset"),
    Field::optional("safe_duration_factor"),
    Field::optional("safe_duration_offset"),
];

const FREQUENCIES: &[Field] = &[
    Field::required("trip_id").references("trips", "trip_id"),
    Field::required("start_time"),
    Field::required("end_time"),
    Field::required("headway_secs"),
    Field::optional("exact_times"),
];

const ATTRIBUTIONS: &[Field] = &[
    Field::optional("attribution_id"),
    Field::optional("agency_id").references("agency", "agency_id"),
    Field::optional("route_id").references("routes", "route_id"),
    Field::optional("trip_id").references("trips", "trip_id"),
    Field::required("organization_name"),
    Field::optional("is_producer"),
    Field::optional("is_operator"),
    Field::optional("is_authority"),
    Field::optional("attribution_url"),
    Field::optional("attribution_email"),
    Field::optional("attribution_phone"),
];

/// `record_id` names a row of `table_name`, so it carries no fixed reference.
const TRANSLATIONS: &[Field] = &[
    Field::required("table_name"),
    Field::required("field_name"),
    Field::required("language"),
    Field::required("translation"),
    Field::optional("record_id"),
    Field::optional("record_sub_id"),
    Field::optional("field_value"),
];

/// The GTFS tables in dependency order.
#[must_use]
pub fn tables() -> Vec<TableDescriptor> {
    vec![
        TableDescriptor::keyed("agency", "agency_id", AGENCY),
        TableDescriptor::keyed("calendar", "service_id", CALENDAR),
        TableDescriptor::keyed("calendar_dates", "service_id", CALENDAR_DATES).with_order("date"),
        TableDescriptor::keyed("booking_rules", "booking_rule_id", BOOKING_RULES),
        TableDescriptor::keyed("fare_attributes", "fare_id", FARE_ATTRIBUTES),
        TableDescriptor::keyless("feed_info", FEED_INFO),
        TableDescriptor::keyed("routes", "route_id", ROUTES).with_alt_key("route_short_name"),
        TableDescriptor::keyed("shapes", "shape_id", SHAPES).with_order("shape_pt_sequence"),
        TableDescriptor::keyed("levels", "level_id", LEVELS),
        TableDescriptor::keyed("stops", "stop_id", STOPS).with_alt_key("stop_code"),
        TableDescriptor::keyed("pathways", "pathway_id", PATHWAYS),
        TableDescriptor::keyed("areas", "area_id", AREAS),
        TableDescriptor::keyless("stop_areas", STOP_AREAS),
        TableDescriptor::keyed("locations", "location_id", LOCATIONS),
        TableDescriptor::keyless("location_shapes", LOCATION_SHAPES),
        TableDescriptor::keyed("location_groups", "location_group_id", LOCATION_GROUPS),
        TableDescriptor::keyed("location_group_stops", "location_group_id", LOCATION_GROUP_STOPS)
            .with_order("stop_id"),
        TableDescriptor::keyless("fare_rules", FARE_RULES),
        TableDescriptor::keyless("transfers", TRANSFERS),
        TableDescriptor::keyed("trips", "trip_id", TRIPS),
        TableDescriptor::keyed("stop_times", "trip_id", STOP_TIMES).with_order("stop_sequence"),
        TableDescriptor::keyed("frequencies", "trip_id", FREQUENCIES).with_order("start_time"),
        TableDescriptor::keyless("attributions", ATTRIBUTIONS),
        TableDescriptor::keyless("translations", TRANSLATIONS),
    ]
}

/// A [`Schema`] over [`tables`].
#[must_use]
pub fn schema() -> Schema {
    Schema::new(tables())
}
