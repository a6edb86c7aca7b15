use crate::country_client::{CountryClient, CountryRecord};
use crate::error::{ViewerError, ViewerResult};
use crate::image_service::{DisplayImage, ImageService};
use crate::openai_client::{CARTOON_PROMPT, OpenAiImageClient};
use crate::pokemon_client::{PokemonClient, PokemonRecord};
use crate::session::Session;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

pub const HELP_TEXT: &str = "\
Commands:
  load <country>    look up a country and show its flag (bare text works too)
  cartoon           turn the last loaded flag into a cartoon
  pokemon <name>    show a Pokémon's abilities
  help              show this message
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LoadCountry(String),
    Cartoonize,
    Pokemon(String),
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head.to_lowercase().as_str() {
            "quit" | "exit" if rest.is_empty() => Command::Quit,
            "help" | "?" if rest.is_empty() => Command::Help,
            "cartoon" | "cartoonize" if rest.is_empty() => Command::Cartoonize,
            "load" => Command::LoadCountry(rest.to_string()),
            "pokemon" => Command::Pokemon(rest.to_string()),
            _ => Command::LoadCountry(line.to_string()),
        }
    }
}

/// Content of one image region.
#[derive(Debug, Clone)]
pub enum ImageRegion {
    Image(DisplayImage),
    Message(String),
}

/// The three regions the viewer writes into.
pub trait DisplaySurface {
    fn set_status(&mut self, text: &str);
    fn set_original(&mut self, region: ImageRegion);
    fn set_transformed(&mut self, region: ImageRegion);
}

pub struct TerminalSurface<W: Write> {
    out: W,
    save_dir: Option<PathBuf>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, save_dir: Option<PathBuf>) -> Self {
        Self { out, save_dir }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render_image(&mut self, label: &str, file_name: &str, region: ImageRegion) {
        let line = match region {
            ImageRegion::Message(text) => text,
            ImageRegion::Image(image) => {
                let mut summary = format!(
                    "{}x{} {:?}, {} bytes",
                    image.width(),
                    image.height(),
                    image.image().color(),
                    image.bytes().len()
                );
                if let Some(dir) = &self.save_dir {
                    let path = dir.join(file_name);
                    match image.save(&path) {
                        Ok(()) => summary.push_str(&format!(" -> {}", path.display())),
                        Err(e) => summary.push_str(&format!(" (not saved: {})", e)),
                    }
                }
                summary
            }
        };
        self.write_line(label, &line);
    }

    fn write_line(&mut self, label: &str, text: &str) {
        let indent = " ".repeat(label.len() + 3);
        let mut rendered = String::new();
        for (i, line) in text.lines().enumerate() {
            if i == 0 {
                rendered.push_str(&format!("[{}] {}\n", label, line));
            } else {
                rendered.push_str(&format!("{}{}\n", indent, line));
            }
        }
        if rendered.is_empty() {
            rendered = format!("[{}]\n", label);
        }

        if let Err(e) = self.out.write_all(rendered.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write> DisplaySurface for TerminalSurface<W> {
    fn set_status(&mut self, text: &str) {
        self.write_line("status", text);
    }

    fn set_original(&mut self, region: ImageRegion) {
        self.render_image("flag", "flag.png", region);
    }

    fn set_transformed(&mut self, region: ImageRegion) {
        self.render_image("cartoon", "cartoon.png", region);
    }
}

pub struct Clients {
    pub country: CountryClient,
    pub images: ImageService,
    pub openai: OpenAiImageClient,
    pub pokemon: PokemonClient,
}

#[derive(Debug)]
pub struct LoadedCountry {
    pub record: CountryRecord,
    pub flag: DisplayImage,
    pub flag_bytes: Vec<u8>,
}

/// Result of a background action, delivered back to the display loop.
#[derive(Debug)]
pub enum Outcome {
    Country(ViewerResult<LoadedCountry>),
    Cartoon(ViewerResult<DisplayImage>),
    Pokemon(ViewerResult<PokemonRecord>),
}

async fn load_country(clients: &Clients, name: &str) -> ViewerResult<LoadedCountry> {
    let record = clients.country.fetch_country(name).await?;
    let flag_url = record.flag_png_url()?.to_string();

    let (flag, flag_bytes) = tokio::join!(
        clients.images.fetch_display_image(&flag_url),
        clients.images.fetch_bytes(&flag_url)
    );

    Ok(LoadedCountry {
        record,
        flag: flag?,
        flag_bytes: flag_bytes?,
    })
}

pub fn country_status(record: &CountryRecord) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        record.common_name().unwrap_or("Unknown country"),
        record.currency_label(),
        record.capital_label(),
        record.region_label()
    )
}

pub struct Viewer<S: DisplaySurface> {
    clients: Arc<Clients>,
    session: Session,
    surface: S,
    prompt: String,
    outcomes_tx: UnboundedSender<Outcome>,
    outcomes_rx: UnboundedReceiver<Outcome>,
    in_flight: usize,
}

impl<S: DisplaySurface> Viewer<S> {
    pub fn new(clients: Clients, surface: S) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            clients: Arc::new(clients),
            session: Session::new(),
            surface,
            prompt: CARTOON_PROMPT.to_string(),
            outcomes_tx,
            outcomes_rx,
            in_flight: 0,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs `action` in the background. If the task dies without an outcome,
    /// `on_failure` still reports back so `in_flight` drops.
    fn spawn<F>(&mut self, action: F, on_failure: fn(ViewerError) -> Outcome)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.outcomes_tx.clone();
        self.in_flight += 1;
        let task = tokio::spawn(action);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Background action did not finish: {}", e);
                    on_failure(ViewerError::ActionFailed(e.to_string()))
                }
            };
            // The receiver lives as long as the viewer; a send error only
            // happens during shutdown.
            let _ = tx.send(outcome);
        });
    }

    /// Starts the action for `command`. Returns `false` once the user asked to quit.
    pub fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Empty => {}
            Command::Quit => return false,
            Command::Help => self.surface.set_status(HELP_TEXT),
            Command::LoadCountry(name) => {
                info!("Loading country '{}'", name.trim());
                self.surface.set_status(&format!("Loading {}...", name.trim()));
                let clients = Arc::clone(&self.clients);
                self.spawn(
                    async move { Outcome::Country(load_country(&clients, &name).await) },
                    |e| Outcome::Country(Err(e)),
                );
            }
            Command::Cartoonize => {
                let snapshot = self.session.flag_snapshot();
                let target = self
                    .session
                    .country()
                    .and_then(|c| c.common_name())
                    .unwrap_or("flag");
                info!("Cartoonizing {}", target);
                self.surface
                    .set_transformed(ImageRegion::Message(format!("Cartoonizing {}...", target)));

                let clients = Arc::clone(&self.clients);
                let prompt = self.prompt.clone();
                self.spawn(
                    async move {
                        let source: &[u8] = snapshot.as_deref().unwrap_or(&[]);
                        Outcome::Cartoon(clients.openai.cartoonize(source, &prompt).await)
                    },
                    |e| Outcome::Cartoon(Err(e)),
                );
            }
            Command::Pokemon(name) => {
                self.surface.set_status(&format!("Looking up {}...", name.trim()));
                let clients = Arc::clone(&self.clients);
                self.spawn(
                    async move { Outcome::Pokemon(clients.pokemon.fetch(&name).await) },
                    |e| Outcome::Pokemon(Err(e)),
                );
            }
        }
        true
    }

    /// Writes a finished action into the session and the display regions.
    pub fn apply(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Outcome::Country(Ok(loaded)) => {
                self.surface.set_status(&country_status(&loaded.record));
                self.surface.set_original(ImageRegion::Image(loaded.flag));
                self.session.store(loaded.record, loaded.flag_bytes);
            }
            Outcome::Country(Err(e)) => self.surface.set_status(&e.to_string()),
            Outcome::Cartoon(Ok(image)) => self.surface.set_transformed(ImageRegion::Image(image)),
            Outcome::Cartoon(Err(e)) => {
                self.surface.set_transformed(ImageRegion::Message(e.to_string()))
            }
            Outcome::Pokemon(Ok(record)) => self
                .surface
                .set_status(&format!("{}\n{}", record.name, record.abilities_text())),
            Outcome::Pokemon(Err(e)) => self.surface.set_status(&e.to_string()),
        }
    }

    #[cfg(test)]
    pub async fn next_outcome(&mut self) -> Option<Outcome> {
        self.outcomes_rx.recv().await
    }

    /// Runs until `quit` or until input closes and every pending action has
    /// reported back. Returns the surface.
    pub async fn run(mut self, mut input: UnboundedReceiver<String>) -> S {
        let mut input_open = true;

        loop {
            if !input_open && self.in_flight == 0 {
                break;
            }

            tokio::select! {
                line = input.recv(), if input_open => match line {
                    Some(line) => {
                        if !self.dispatch(Command::parse(&line)) {
                            break;
                        }
                    }
                    None => {
                        debug!("Input closed with {} action(s) pending", self.in_flight);
                        input_open = false;
                    }
                },
                Some(outcome) = self.outcomes_rx.recv() => self.apply(outcome),
            }
        }

        self.surface
    }
}
