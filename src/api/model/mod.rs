//! The entities of our domain and all SQL that operates on them. The GraphQL
//! wrapper types of both API flavors live in the sibling modules `offset` and
//! `relay` and delegate to the types in here.

use postgres_types::ToSql;
use tokio_postgres::Row;

use crate::{
    api::{Context, err::ApiResult},
    db::types::Key,
};

pub(crate) mod book;
pub(crate) mod read;
pub(crate) mod user;

pub(crate) use self::{
    book::Book,
    read::{DeleteRatingPayload, ReadRecord},
    user::User,
};


/// One page of a keyset-paginated query, plus the information needed to build
/// the pagination envelope around it.
pub(crate) struct Page<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) has_next_page: bool,
    pub(crate) has_previous_page: bool,
}

/// Runs a keyset-paginated query.
///
/// `inner` must select the entity's columns plus `row_number() over(order by
/// id) as row_num` and `count(*) over() as total_count`; `count` must count
/// the same filtered set. `$1..` in both queries refer to `args`. The cursor
/// filter is applied outside of `inner` so that `row_num` and `total_count`
/// always refer to the whole (filtered) collection.
pub(crate) async fn load_page_after<T>(
    inner: &str,
    count: &str,
    args: &[&(dyn ToSql + Sync)],
    after: Option<Key>,
    limit: i64,
    from_row: impl Fn(&Row) -> T,
    context: &Context,
) -> ApiResult<Page<T>> {
    let mut full_args: Vec<&(dyn ToSql + Sync)> = args.to_vec();
    let filter = match &after {
        Some(key) => {
            full_args.push(key);
            format!("where id > ${}", full_args.len())
        }
        None => String::new(),
    };

    let query = format!(
        "select * from ({inner}) as tmp {filter} order by id limit {limit}",
    );

    // `first_num` and `last_num` are 1-based!
    let mut total_count = None;
    let mut first_num = None;
    let mut last_num = None;

    let rows = context.db.query(query.as_str(), &full_args).await?;
    let items = rows.iter()
        .map(|row| {
            // Retrieve total count once
            if total_count.is_none() {
                total_count = Some(row.get::<_, i64>("total_count"));
            }

            // Handle row numbers
            let row_num = row.get::<_, i64>("row_num");
            last_num = Some(row_num);
            if first_num.is_none() {
                first_num = Some(row_num);
            }

            from_row(row)
        })
        .collect::<Vec<_>>();

    // If `total_count` is `None`, the page was empty. We really do want to
    // know the total count, so we do another query.
    let total_count = match total_count {
        Some(c) => c,
        None => context.db.query_one(count, args).await?.get::<_, i64>(0),
    };

    // Figure out whether there is a next and/or previous page. If the DB
    // returned 0 rows, either the collection is actually empty or `after`
    // pointed at (or past) its last element.
    let (has_next_page, has_previous_page) = match Option::zip(first_num, last_num) {
        Some((first, last)) => (last < total_count, first > 1),
        None => (false, after.is_some() && total_count > 0),
    };

    Ok(Page { items, total_count, has_next_page, has_previous_page })
}
