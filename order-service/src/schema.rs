diesel::table! {
    inventory (menu_id) {
        menu_id -> Int4,
        stock -> Int4,
    }
}

diesel::table! {
    menu_options (id) {
        id -> Int4,
        menu_id -> Int4,
        name -> Varchar,
        price -> Int4,
    }
}

diesel::table! {
    menus (id) {
        id -> Int4,
        name -> Varchar,
        price -> Int4,
        description -> Nullable<Text>,
        image -> Nullable<Varchar>,
    }
}

diesel::table! {
    order_item_options (order_item_id, option_name) {
        order_item_id -> Uuid,
        option_name -> Varchar,
        position -> Int4,
    }
}

diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        position -> Int4,
        menu_id -> Int4,
        menu_name -> Varchar,
        quantity -> Int4,
        price -> Int4,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        total_amount -> Int4,
        order_date -> Timestamptz,
        status -> Varchar,
    }
}

diesel::joinable!(inventory -> menus (menu_id));
diesel::joinable!(menu_options -> menus (menu_id));
diesel::joinable!(order_item_options -> order_items (order_item_id));
diesel::joinable!(order_items -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    inventory,
    menu_options,
    menus,
    order_item_options,
    order_items,
    orders,
);
