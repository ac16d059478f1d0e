//! Page view model and the template set it renders through.

use minijinja::{Environment, Value};
use playground_engine::Config;
use serde::Serialize;

use crate::assets;
use crate::error::{Result, ServerError};

/// Name of the page template.
pub const INDEX_TEMPLATE: &str = "index.html";

/// Options per row in the rendered option form.
pub const OPTIONS_PER_ROW: usize = 3;

/// Everything the index page shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageData {
    pub content: String,
    pub preview: String,
    pub config: Config,
    pub error: String,
}

impl PageData {
    /// A fresh page showing the default options.
    pub fn with_defaults(schema: &Config) -> Self {
        Self {
            config: schema.clone(),
            ..Default::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Parsed page templates.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Load every template shipped in the embedded assets.
    pub fn from_assets() -> Result<Self> {
        let mut env = Environment::new();
        env.add_function("group", group);
        env.add_global("options_per_row", Value::from(OPTIONS_PER_ROW as u64));

        for (name, bytes) in assets::templates() {
            let source = std::str::from_utf8(bytes).map_err(|e| {
                ServerError::config_error(format!("template '{}' is not UTF-8: {}", name, e))
            })?;
            env.add_template(name, source)?;
        }

        // Fail at startup rather than on the first request.
        env.get_template(INDEX_TEMPLATE)?;

        Ok(Self { env })
    }

    /// Render the index page.
    pub fn render_index(&self, data: &PageData) -> Result<String> {
        let template = self.env.get_template(INDEX_TEMPLATE)?;
        Ok(template.render(data)?)
    }
}

/// Split `items` into rows of `size`; `size == 0` keeps a single row.
fn group(items: Vec<Value>, size: usize) -> Vec<Vec<Value>> {
    if size == 0 {
        return vec![items];
    }
    items.chunks(size).map(|row| row.to_vec()).collect()
}
