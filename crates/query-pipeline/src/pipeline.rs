//! The four query stages and their composition.

use doc_store::{DocumentStore, Predicate, Projection, Query, SortKey};

use crate::config::{DEFAULT_PAGE, QueryPipelineConfig};
use crate::filter::{self, validate_field};
use crate::request::{ParamValue, QueryRequest};
use crate::{PipelineError, QuerySpec, Result};

/// Turns query requests into query specs and applies them to base queries.
///
/// The pipeline holds only configuration; it is cheap to share and every
/// method is a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct QueryPipeline {
    config: QueryPipelineConfig,
}

impl QueryPipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: QueryPipelineConfig) -> Self {
        Self { config }
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &QueryPipelineConfig {
        &self.config
    }

    /// Filter stage: every non-reserved parameter becomes a condition.
    pub fn filter(&self, request: &QueryRequest) -> Result<Predicate> {
        filter::build(&self.config, request)
    }

    /// Sort stage: `sort=price,-ratingsAverage`, primary key first.
    pub fn sort(&self, request: &QueryRequest, spec: &mut QuerySpec) -> Result<()> {
        let keys = match self.reserved("sort", request)? {
            Some(raw) => field_list(raw)
                .map(|segment| match segment.strip_prefix('-') {
                    Some(field) => validate_field(field).map(|_| SortKey::desc(field)),
                    None => validate_field(segment).map(|_| SortKey::asc(segment)),
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        spec.sort = if keys.is_empty() {
            self.config.default_sort.clone()
        } else {
            keys
        };
        Ok(())
    }

    /// Projection stage: `fields=name,price` or `fields=-description`.
    pub fn project(&self, request: &QueryRequest, spec: &mut QuerySpec) -> Result<()> {
        let raw = self.reserved("fields", request)?;
        let fields: Vec<&str> = raw.map(|r| field_list(r).collect()).unwrap_or_default();

        if fields.is_empty() {
            spec.projection = Projection::Exclude(vec![self.config.version_field.clone()]);
            return Ok(());
        }

        let excluded = fields.iter().filter(|f| f.starts_with('-')).count();
        if excluded != 0 && excluded != fields.len() {
            return Err(PipelineError::InvalidProjection {
                fields: raw.unwrap_or_default().to_string(),
            });
        }

        let names = fields
            .iter()
            .map(|f| {
                let name = f.trim_start_matches('-');
                validate_field(name).map(|_| name.to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        spec.projection = if excluded == 0 {
            Projection::Include(names)
        } else {
            Projection::Exclude(names)
        };
        Ok(())
    }

    /// Pagination stage: `page` and `limit` as positive integers.
    ///
    /// Anything unparseable or non-positive falls back to the default; limits
    /// above the configured maximum are clamped.
    pub fn paginate(&self, request: &QueryRequest, spec: &mut QuerySpec) -> Result<()> {
        let page = positive(self.reserved("page", request)?).unwrap_or(DEFAULT_PAGE);
        let limit = positive(self.reserved("limit", request)?)
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit);

        spec.page = page;
        spec.limit = limit;
        spec.skip = (page - 1).saturating_mul(limit);
        Ok(())
    }

    /// Runs all four stages and returns the resolved spec.
    #[tracing::instrument(skip_all)]
    pub fn resolve(&self, request: &QueryRequest) -> Result<QuerySpec> {
        metrics::counter!("query_pipeline_requests_total").increment(1);
        self.run_stages(request).inspect_err(|err| {
            metrics::counter!("query_pipeline_rejections_total", "kind" => err.kind())
                .increment(1);
            tracing::debug!(error = %err, "query rejected");
        })
    }

    /// Applies a request to a base query.
    ///
    /// The base query's own filter is kept and narrowed; sort, projection and
    /// pagination are replaced. The returned query has not been executed.
    pub fn apply<'s, S>(
        &self,
        base: Query<'s, S>,
        request: &QueryRequest,
    ) -> Result<(Query<'s, S>, QuerySpec)>
    where
        S: DocumentStore + ?Sized,
    {
        let spec = self.resolve(request)?;
        let query = base
            .filter(spec.filter.clone())
            .sort(spec.sort.clone())
            .select(spec.projection.clone())
            .skip(spec.skip)
            .limit(spec.limit);
        Ok((query, spec))
    }

    fn run_stages(&self, request: &QueryRequest) -> Result<QuerySpec> {
        let mut spec = QuerySpec {
            filter: self.filter(request)?,
            sort: Vec::new(),
            projection: Projection::All,
            page: DEFAULT_PAGE,
            skip: 0,
            limit: self.config.default_limit,
        };
        self.sort(request, &mut spec)?;
        self.project(request, &mut spec)?;
        self.paginate(request, &mut spec)?;
        Ok(spec)
    }

    /// Reads a reserved parameter, which must be a single plain value.
    fn reserved<'r>(&self, key: &str, request: &'r QueryRequest) -> Result<Option<&'r str>> {
        match request.get(key) {
            None => Ok(None),
            Some(ParamValue::Scalar(value)) => Ok(Some(value)),
            Some(ParamValue::Repeated(_)) => {
                Err(PipelineError::parameter(key, "given more than once"))
            }
            Some(ParamValue::Operators(_)) => {
                Err(PipelineError::parameter(key, "does not accept operators"))
            }
        }
    }
}

fn field_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|r| r.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}
