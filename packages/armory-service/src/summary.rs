//! Typed views over an [`AggregatedRecord`]. Conversion never fails: absent or mistyped fields
//! fall back to their defaults.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregator::AggregatedRecord;

const MAIN_RAW_ASSET: &str = "main-raw";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CharacterSummary {
	pub name: String,
	pub level: u64,
	pub average_item_level: u64,
	pub achievement_points: u64,
	pub realm: String,
	pub faction: String,
	pub class: String,
	pub active_spec: String,
	pub guild: Option<String>,
	pub health: u64,
	pub power: u64,
	pub power_type: String,
	pub stamina: u64,
	pub main_raw_image: Option<String>,
}
impl From<&AggregatedRecord> for CharacterSummary {
	fn from(record: &AggregatedRecord) -> Self {
		let map = record.as_map();

		Self {
			name: text(map, &["name"]),
			level: number(map, &["level"]),
			average_item_level: number(map, &["average_item_level"]),
			achievement_points: number(map, &["achievement_points"]),
			realm: text(map, &["realm", "name"]),
			faction: text(map, &["faction", "name"]),
			class: text(map, &["character_class", "name"]),
			active_spec: text(map, &["active_spec", "name"]),
			guild: optional_text(map, &["guild", "name"]),
			health: number(map, &["health"]),
			power: number(map, &["power"]),
			power_type: text(map, &["power_type", "name"]),
			stamina: number(map, &["stamina", "effective"]),
			main_raw_image: main_raw_image(map),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rank {
	pub number: u64,
	pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuildProgress {
	pub server: Rank,
	pub region: Rank,
	pub world: Rank,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuildSummary {
	pub name: String,
	pub faction: String,
	pub member_count: u64,
	pub achievement_points: u64,
	pub progress: Option<GuildProgress>,
	pub members: Vec<String>,
}
impl From<&AggregatedRecord> for GuildSummary {
	fn from(record: &AggregatedRecord) -> Self {
		let map = record.as_map();
		let ranking = get(map, &["guildData", "guild"]).and_then(Value::as_object);
		let name = ranking
			.and_then(|guild| optional_text(guild, &["name"]))
			.unwrap_or_else(|| text(map, &["name"]));
		let member_count = ranking
			.and_then(|guild| get(guild, &["members", "total"]))
			.and_then(as_number)
			.unwrap_or_else(|| number(map, &["member_count"]));
		let progress = ranking
			.and_then(|guild| get(guild, &["zoneRanking", "progress"]))
			.and_then(Value::as_object)
			.map(|progress| GuildProgress {
				server: rank(progress, "serverRank"),
				region: rank(progress, "regionRank"),
				world: rank(progress, "worldRank"),
			});
		let mut members = ranking.map(attendance_players).unwrap_or_default();

		if members.is_empty() {
			members = roster_members(map);
		}

		Self {
			name,
			faction: text(map, &["faction", "name"]),
			member_count,
			achievement_points: number(map, &["achievement_points"]),
			progress,
			members,
		}
	}
}

fn get<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
	let (first, rest) = path.split_first()?;

	rest.iter().try_fold(map.get(*first)?, |value, field| value.get(*field))
}

fn optional_text(map: &Map<String, Value>, path: &[&str]) -> Option<String> {
	get(map, path).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

fn text(map: &Map<String, Value>, path: &[&str]) -> String {
	optional_text(map, path).unwrap_or_default()
}

// Upstreams report some integers as floats.
fn as_number(value: &Value) -> Option<u64> {
	value.as_u64().or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn number(map: &Map<String, Value>, path: &[&str]) -> u64 {
	get(map, path).and_then(as_number).unwrap_or_default()
}

fn main_raw_image(map: &Map<String, Value>) -> Option<String> {
	map.get("assets")?
		.as_array()?
		.iter()
		.find(|asset| asset.get("key").and_then(Value::as_str) == Some(MAIN_RAW_ASSET))
		.and_then(|asset| asset.get("value"))
		.and_then(Value::as_str)
		.map(str::to_string)
}

fn rank(progress: &Map<String, Value>, field: &str) -> Rank {
	Rank {
		number: number(progress, &[field, "number"]),
		color: text(progress, &[field, "color"]),
	}
}

// `attendance.data` is a list of raid reports, each with its players; names are deduplicated in
// first-seen order.
fn attendance_players(guild: &Map<String, Value>) -> Vec<String> {
	let reports = match get(guild, &["attendance", "data"]) {
		Some(Value::Array(reports)) => reports.iter().collect::<Vec<_>>(),
		Some(report @ Value::Object(_)) => vec![report],
		_ => return Vec::new(),
	};
	let mut names = Vec::new();

	for report in reports {
		let players = report.get("players").and_then(Value::as_array).into_iter().flatten();

		for name in players.filter_map(|player| player.get("name").and_then(Value::as_str)) {
			if !names.iter().any(|seen: &String| seen == name) {
				names.push(name.to_string());
			}
		}
	}

	names
}

fn roster_members(map: &Map<String, Value>) -> Vec<String> {
	map.get("members")
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(|member| member.pointer("/character/name").and_then(Value::as_str))
		.map(str::to_string)
		.collect()
}
