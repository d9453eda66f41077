use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Table};
use sd_catalog_tags::config::default_data_dir;
use sd_catalog_tags::domain::{AccessScope, Actor, AuditFilter, EntityId, SequenceToken, TagId};
use sd_catalog_tags::infra::db::CatalogSeed;
use sd_catalog_tags::logging::init_logging;
use sd_catalog_tags::{AppConfig, Database, TagAssignmentManager};
use std::collections::BTreeSet;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "sd-tags", about = "Manage hierarchical tags on catalog entries")]
struct Cli {
	/// Path to the data directory (config, database and logs)
	#[arg(long, global = true, env = "SD_TAGS_DATA_DIR")]
	data_dir: Option<PathBuf>,

	/// Entities the operator may touch: `all` or a comma separated id list
	#[arg(long, global = true, default_value = "all")]
	scope: AccessScope,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Import tags and entries from a JSON file
	Import { file: PathBuf },
	/// Print the tag hierarchy
	Tree,
	/// List catalog entries in scope
	Entries,
	/// Show the tags assigned to an entry
	Show { entity: String },
	/// Replace the tags of an entry with the given selection
	Set {
		entity: String,
		/// Selected tag id, repeat for each tag (omit all to clear)
		#[arg(long = "tag")]
		tags: Vec<String>,
		#[arg(long)]
		actor_id: String,
		#[arg(long)]
		actor_label: String,
	},
	/// Browse the audit log, newest first
	History {
		#[arg(long)]
		entity: Option<String>,
		/// Inclusive lower bound (RFC 3339)
		#[arg(long)]
		from: Option<DateTime<Utc>>,
		/// Inclusive upper bound (RFC 3339)
		#[arg(long)]
		to: Option<DateTime<Utc>>,
		/// Case-insensitive text to look for in the summary
		#[arg(long)]
		text: Option<String>,
		#[arg(long)]
		page_size: Option<u64>,
		/// Cursor printed at the end of the previous page
		#[arg(long)]
		cursor: Option<SequenceToken>,
	},
	/// Delete audit entries by id
	Purge {
		#[arg(required = true)]
		ids: Vec<Uuid>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let data_dir = match cli.data_dir {
		Some(dir) => dir,
		None => default_data_dir()?,
	};
	let config = AppConfig::load_from(&data_dir)?;
	init_logging(&config.data_dir, &config.log_level)?;

	let db = Database::create(&config.database_path(), &config.database).await?;
	db.migrate().await?;

	let manager = TagAssignmentManager::new(db.shared(), &config);
	let scope = cli.scope;

	match cli.command {
		Command::Import { file } => {
			let seed = CatalogSeed::from_path(&file)
				.with_context(|| format!("Failed to load {}", file.display()))?;
			let report = seed.apply(db.conn()).await?;
			println!(
				"Imported {} tags and {} entries",
				report.tags, report.entries
			);
		}
		Command::Tree => {
			let graph = manager.load_graph().await?;
			if graph.is_empty() {
				println!("No tags");
			}
			for (depth, tag) in graph.depth_first() {
				println!("{}{} [{}]", "  ".repeat(depth), tag.name, tag.id);
			}
		}
		Command::Entries => {
			let entries = manager.list_entries(&scope).await?;

			let mut table = Table::new();
			table.load_preset(UTF8_BORDERS_ONLY);
			table.set_header(vec!["Id", "Name", "Address", "Tags"]);
			for entry in entries {
				table.add_row(vec![
					entry.id.to_string(),
					entry.name,
					entry.address.unwrap_or_default(),
					entry.tag_count.to_string(),
				]);
			}
			println!("{table}");
		}
		Command::Show { entity } => {
			let snapshot = manager.load_snapshot(&scope, &EntityId::from(entity)).await?;
			let assignment = &snapshot.assignment;

			println!(
				"{} ({}) revision {}",
				assignment.entity_name, assignment.entity_id, assignment.revision
			);
			let names =
				TagAssignmentManager::selected_tag_names(&snapshot.graph, &assignment.tag_ids);
			if names.is_empty() {
				println!("  (no tags)");
			}
			for name in names {
				println!("  {name}");
			}
		}
		Command::Set {
			entity,
			tags,
			actor_id,
			actor_label,
		} => {
			let checked: BTreeSet<TagId> = tags.into_iter().map(TagId::from).collect();
			let actor = Actor::new(actor_id, actor_label);

			let outcome = manager
				.update_tags(&scope, &EntityId::from(entity), &checked, &actor)
				.await?;

			for warning in &outcome.warnings {
				eprintln!("warning: {warning}");
			}
			match outcome.entry {
				Some(entry) => println!("{}\naudit entry {}", entry.summary, entry.id),
				None => println!("No changes"),
			}
		}
		Command::History {
			entity,
			from,
			to,
			text,
			page_size,
			cursor,
		} => {
			let filter = AuditFilter {
				entity_id: entity.map(EntityId::from),
				date_from: from,
				date_to: to,
				text_contains: text,
				..Default::default()
			};
			let page = manager
				.history(&scope, filter, page_size, cursor.as_ref())
				.await?;

			let mut table = Table::new();
			table.load_preset(UTF8_BORDERS_ONLY);
			table.set_header(vec!["Time", "Entry", "Summary"]);
			for entry in &page.entries {
				table.add_row(vec![
					entry.timestamp.to_rfc3339(),
					entry.id.to_string(),
					entry.summary.clone(),
				]);
			}
			println!("{table}");

			if let Some(next) = page.next_cursor {
				println!("More entries available, continue with --cursor {next}");
			}
		}
		Command::Purge { ids } => {
			let ids: BTreeSet<Uuid> = ids.into_iter().collect();
			let deleted = manager.delete_history(&scope, &ids).await?;
			println!("Deleted {deleted} of {} audit entries", ids.len());
		}
	}

	Ok(())
}
