//! Text commands over the views, shared by the one-shot CLI and the shell.

use std::fmt::Write as _;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use organizer_core::Identity;

use crate::chip::{LinkChip, NodeChip};
use crate::collection::EntityCollection;
use crate::context::ViewContext;
use crate::error::Result;
use crate::links::NodeLinks;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List entity types and suggested relationship types.
    Types,

    /// List every entity of a type.
    List { entity_type: String },

    /// Show one entity with its relationships.
    Show { entity_type: String, index: usize },

    /// Create (or find) an entity from field=value pairs.
    Create {
        entity_type: String,
        #[arg(value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// Edit fields of an entity.
    Edit {
        entity_type: String,
        index: usize,
        #[arg(value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// Relate an entity to another one.
    Link {
        entity_type: String,
        index: usize,
        link_type: String,
        target_type: String,
        target_index: usize,
    },

    /// Delete a relationship of an entity.
    Unlink {
        entity_type: String,
        index: usize,
        #[arg(value_parser = parse_identity)]
        link: Identity,
    },

    /// Read commands line by line from stdin.
    Shell,
}

/// A shell line: a command without the program name.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected field=value, got `{raw}`"))
}

fn parse_identity(raw: &str) -> std::result::Result<Identity, String> {
    raw.trim_start_matches('#')
        .parse()
        .map(Identity)
        .map_err(|_| format!("expected a relationship identity like #12, got `{raw}`"))
}

/// Split a shell line on whitespace, keeping double-quoted runs together.
pub fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// One user session against a graph.
pub struct Session {
    ctx: ViewContext,
}

impl Session {
    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ViewContext {
        &self.ctx
    }

    /// Run one command and return what it prints.
    pub async fn execute(&self, command: &Command) -> Result<String> {
        let mut out = String::new();
        match command {
            Command::Types => self.types(&mut out),
            Command::List { entity_type } => self.list(entity_type, &mut out).await?,
            Command::Show { entity_type, index } => self.show(entity_type, *index, &mut out).await?,
            Command::Create {
                entity_type,
                fields,
            } => self.create(entity_type, fields, &mut out).await?,
            Command::Edit {
                entity_type,
                index,
                fields,
            } => self.edit(entity_type, *index, fields, &mut out).await?,
            Command::Link {
                entity_type,
                index,
                link_type,
                target_type,
                target_index,
            } => {
                self.link(entity_type, *index, link_type, target_type, *target_index, &mut out)
                    .await?
            }
            Command::Unlink {
                entity_type,
                index,
                link,
            } => self.unlink(entity_type, *index, *link, &mut out).await?,
            Command::Shell => out.push_str("Already in a shell\n"),
        }
        Ok(out)
    }

    /// Execute each input line until end of input. Errors are printed as a
    /// line and the shell carries on.
    pub async fn run_shell<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let words = split_line(&line);
            if words.is_empty() {
                continue;
            }
            if matches!(words[0].as_str(), "quit" | "exit") {
                break;
            }
            let text = match ShellLine::try_parse_from(&words) {
                Ok(parsed) => match self.execute(&parsed.command).await {
                    Ok(text) => text,
                    Err(e) => format!("error: {e}\n"),
                },
                Err(e) => format!("{}\n", e.to_string().trim_end()),
            };
            output.write_all(text.as_bytes()).await?;
            output.flush().await?;
        }
        Ok(())
    }

    fn types(&self, out: &mut String) {
        let schema = self.ctx.schema();
        for entity in schema.entities() {
            let fields: Vec<&str> = entity.field_names().map(|f| f.as_str()).collect();
            let _ = writeln!(out, "{} ({}): {}", entity.name, entity.title, fields.join(", "));
        }
        let links: Vec<&str> = schema.link_suggestions().iter().map(|l| l.as_str()).collect();
        let _ = writeln!(out, "Link types: {}", links.join(", "));
    }

    async fn list(&self, entity_type: &str, out: &mut String) -> Result<()> {
        let collection = EntityCollection::open(&self.ctx, entity_type).await?;
        let chips = collection.chips()?;
        if chips.is_empty() {
            let _ = writeln!(out, "No {}", collection.entity_type().title);
        }
        for (i, chip) in chips.iter().enumerate() {
            let _ = writeln!(out, "{i:>3}  {chip}");
        }
        Ok(())
    }

    async fn show(&self, entity_type: &str, index: usize, out: &mut String) -> Result<()> {
        let mut collection = EntityCollection::open(&self.ctx, entity_type).await?;
        let node = collection.select(index)?;
        let _ = writeln!(out, "{}", NodeChip::new(self.ctx.schema(), &node.node));
        for (key, value) in &node.node.properties {
            let _ = writeln!(out, "  {key}: {value}");
        }

        let links = NodeLinks::open(&self.ctx, node).await;
        let _ = writeln!(out, "Outgoing:");
        for entry in links.outgoing()? {
            let _ = writeln!(out, "  {}  {}", entry.link.identity, entry.chip);
        }
        let _ = writeln!(out, "Incoming:");
        for entry in links.incoming()? {
            let _ = writeln!(out, "  {}  {}", entry.link.identity, entry.chip);
        }
        Ok(())
    }

    async fn create(
        &self,
        entity_type: &str,
        fields: &[(String, String)],
        out: &mut String,
    ) -> Result<()> {
        let collection = EntityCollection::open(&self.ctx, entity_type).await?;
        let mut form = collection.create_form();
        for (field, value) in fields {
            form.set(field, value.as_str())?;
        }
        match form.submit().await? {
            Some(node) => {
                let _ = writeln!(out, "Created {}", NodeChip::new(self.ctx.schema(), &node.node));
            }
            None => out.push_str("Nothing created\n"),
        }
        Ok(())
    }

    async fn edit(
        &self,
        entity_type: &str,
        index: usize,
        fields: &[(String, String)],
        out: &mut String,
    ) -> Result<()> {
        let mut collection = EntityCollection::open(&self.ctx, entity_type).await?;
        collection.select(index)?;
        let Some(mut detail) = collection.detail() else {
            out.push_str("Selection vanished\n");
            return Ok(());
        };
        for (field, value) in fields {
            detail.set(field, value.as_str())?;
        }
        match detail.save().await? {
            Some(node) => {
                let _ = writeln!(out, "Saved {}", NodeChip::new(self.ctx.schema(), &node.node));
            }
            None => out.push_str("No changes to save\n"),
        }
        Ok(())
    }

    async fn link(
        &self,
        entity_type: &str,
        index: usize,
        link_type: &str,
        target_type: &str,
        target_index: usize,
        out: &mut String,
    ) -> Result<()> {
        let mut collection = EntityCollection::open(&self.ctx, entity_type).await?;
        let focal = collection.select(index)?;
        let links = NodeLinks::open(&self.ctx, focal.clone()).await;

        let mut flow = links.add_link();
        flow.choose_link_type(link_type)?;
        flow.choose_target_type(target_type).await?;
        flow.choose_target(target_index)?;

        let schema = self.ctx.schema();
        match (flow.submit().await?, flow.target()) {
            (Some(link), Some(target)) => {
                let chip = LinkChip::new(&link)
                    .with_from(NodeChip::new(schema, &focal.node))
                    .with_to(NodeChip::new(schema, target));
                let _ = writeln!(out, "Linked {}  {chip}", link.identity);
            }
            _ => out.push_str("Nothing linked\n"),
        }
        Ok(())
    }

    async fn unlink(
        &self,
        entity_type: &str,
        index: usize,
        link: Identity,
        out: &mut String,
    ) -> Result<()> {
        let mut collection = EntityCollection::open(&self.ctx, entity_type).await?;
        let focal = collection.select(index)?;
        let focal_chip = NodeChip::new(self.ctx.schema(), &focal.node);
        let links = NodeLinks::open(&self.ctx, focal).await;

        let attached = links
            .outgoing()?
            .iter()
            .chain(links.incoming()?.iter())
            .any(|entry| entry.link.identity == link);
        if !attached {
            let _ = writeln!(out, "{link} is not a relationship of {focal_chip}");
            return Ok(());
        }

        links.delete(link).await?;
        let _ = writeln!(out, "Deleted {link}");
        Ok(())
    }
}
