use rocket::Route;

mod admin;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(admin::routes());
    routes
}
