use chrono::Utc;
use clap::{Parser, Subcommand};
use quill_blog::cms::HttpContentClient;
use quill_blog::comments::{self, CommentWidget};
use quill_blog::config::{self, SiteConfig};
use quill_blog::driver::{Driver, GenerateError, Route};
use quill_blog::output;
use quill_blog::paginate::Paginator;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quill-blog")]
#[command(about = "Static blog generator backed by a headless CMS")]
#[command(long_about = "\
Static blog generator backed by a headless CMS

Posts are fetched from a Prismic-style content API and rendered into a
static site: a list page with a \"load more\" button, one page per post,
and a 404 page.

Site directory:

  .
  ├── config.toml        # Site config (optional, layered over the stock defaults)
  └── dist/              # Generated site (--output)
      ├── index.html
      ├── 404.html
      ├── post/<slug>/index.html
      └── .build-manifest.json

Detail pages are revalidated: once [detail].revalidate_secs has passed since
a page was built, 'regenerate' rebuilds it, and 'page' serves the old copy
and rebuilds it right after.

Set RUST_LOG (e.g. RUST_LOG=quill_blog=debug) for more detailed logs.
Run 'quill-blog gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Render with this CMS preview ref instead of the published content
    #[arg(long, global = true)]
    preview_ref: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every post and write the full site
    Build,
    /// Rebuild the list page and every post page past its revalidation window
    Regenerate,
    /// Request a single post route as a visitor would
    Page {
        /// Post slug
        slug: String,
        /// Print the served HTML instead of a summary
        #[arg(long)]
        html: bool,
    },
    /// List every post by paging through the CMS
    Posts,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_blog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let preview = cli.preview_ref.as_deref();
    match cli.command {
        Command::Build => {
            let site = Site::load(&cli.site)?;
            println!("==> Building {}", cli.output.display());
            let report = site.driver(&cli.output, preview)?.build(Utc::now())?;
            output::print_build_report(&report);
        }
        Command::Regenerate => {
            let site = Site::load(&cli.site)?;
            println!("==> Revalidating {}", cli.output.display());
            let report = site.driver(&cli.output, preview)?.regenerate(Utc::now())?;
            output::print_build_report(&report);
        }
        Command::Page { slug, html } => {
            let site = Site::load(&cli.site)?;
            let route = Route::post(&slug)?;
            let response = site.driver(&cli.output, preview)?.request(&route, Utc::now())?;
            if html {
                print!("{}", response.html);
            } else {
                output::print_page_response(&response);
            }
        }
        Command::Posts => {
            let site = Site::load(&cli.site)?;
            let first = site.driver(&cli.output, preview)?.list_props()?;
            let paginator = Paginator::initialize(&site.client, first.posts, first.next_page);
            paginator.load_all()?;
            output::print_posts(
                &paginator.items(),
                &site.config.site.date_format,
                site.config.site.locale()?,
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Loaded configuration and the collaborators built from it.
struct Site {
    config: SiteConfig,
    client: HttpContentClient,
    widget: Box<dyn CommentWidget>,
}

impl Site {
    fn load(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config::load_config(dir)?;
        init_thread_pool(&config.processing);
        let client = HttpContentClient::from_config(&config.cms)?;
        let widget = comments::from_config(&config.comments);
        Ok(Self {
            config,
            client,
            widget,
        })
    }

    fn driver<'a>(
        &'a self,
        output_dir: &'a Path,
        preview: Option<&'a str>,
    ) -> Result<Driver<'a, HttpContentClient>, GenerateError> {
        Ok(Driver::new(&self.client, &self.config, self.widget.as_ref(), output_dir)?
            .with_preview(preview))
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
